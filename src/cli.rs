use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::saved::SortKey;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chat with the assistant to get a recipe
    Chat {
        /// Generate an image for the recipe
        #[arg(long)]
        image: bool,
        /// Email the recipe to this address
        #[arg(long, value_name = "ADDR")]
        email: Option<String>,
        /// Save the recipe to your collection
        #[arg(long)]
        save: bool,
    },
    /// Parse a raw AI response file and print the recipe
    Parse {
        /// Path to the response text file
        file: PathBuf,
    },
    /// List saved recipes
    Saved {
        /// Only show favorites
        #[arg(long)]
        favorites: bool,
        /// Filter by name, ingredient or goal
        #[arg(long, value_name = "TERM")]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Toggle the favorite flag of a saved recipe
    Favorite { id: String },
    /// Delete a saved recipe
    Delete { id: String },
    /// Show past searches
    History,
    /// Interactive task list
    Tasks,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortArg {
    Name,
    Calories,
    Protein,
    Time,
    Created,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortKey::Name,
            SortArg::Calories => SortKey::Calories,
            SortArg::Protein => SortKey::Protein,
            SortArg::Time => SortKey::CookingTime,
            SortArg::Created => SortKey::CreatedAt,
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

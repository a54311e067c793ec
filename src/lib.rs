pub mod api_connection;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod favorites_cache;
pub mod history;
pub mod image;
pub mod notify;
pub mod recipe;
pub mod recipe_parser;
pub mod render;
pub mod saved;
pub mod session;
pub mod tasks;
pub mod view;

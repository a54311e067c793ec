use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use fime::api_connection::Backend;
use fime::cli::{parse_args, Command};
use fime::config::AppConfig;
use fime::conversation::{ConversationController, ConversationStep, Transition};
use fime::history::SearchHistory;
use fime::notify::Notices;
use fime::recipe::GoalTag;
use fime::recipe_parser::parse_with_path;
use fime::render;
use fime::saved::{SavedRecipes, SortDirection};
use fime::session::AppContext;
use fime::tasks::{NewTask, Priority, TaskStore};
use fime::view::{RecipeView, SaveOutcome};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

async fn ask(input: &mut Input, prompt: &str) -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await.context("Failed to read from stdin")?)
}

fn print_notices(notices: &mut Notices) {
    for notice in notices.drain() {
        println!("{}", notice);
    }
}

/// Prints transcript messages added since `shown`.
fn print_transcript(chat: &ConversationController, shown: &mut usize) {
    for message in &chat.transcript()[*shown..] {
        println!("{}", render::message(message));
    }
    *shown = chat.transcript().len();
}

async fn run_chat(
    context: &AppContext,
    backend: Arc<dyn Backend>,
    image: bool,
    email: Option<String>,
    save: bool,
) -> Result<()> {
    let config = context.config();
    let mut chat = ConversationController::new(config.conversation)
        .with_handoff_delay(config.handoff_delay);
    let mut input: Input = BufReader::new(io::stdin()).lines();
    let mut shown = 0;
    print_transcript(&chat, &mut shown);

    loop {
        let Some(line) = ask(&mut input, "> ").await? else {
            chat.abandon();
            return Ok(());
        };
        if chat.submit_ingredients(&line) != Transition::Ignored {
            break;
        }
    }
    print_transcript(&chat, &mut shown);

    for (n, goal) in GoalTag::ALL.iter().enumerate() {
        println!("  {}. {}", n + 1, goal);
    }
    while !chat.can_continue() {
        let Some(line) = ask(&mut input, "Goals (numbers, comma separated): ").await? else {
            chat.abandon();
            return Ok(());
        };
        for choice in line.split(',').filter_map(|n| n.trim().parse::<usize>().ok()) {
            if let Some(goal) = choice.checked_sub(1).and_then(|i| GoalTag::ALL.get(i)) {
                chat.toggle_goal(*goal);
            }
        }
        if !chat.can_continue() {
            println!("Please select at least one goal.");
        }
    }
    chat.continue_with_goals();
    print_transcript(&chat, &mut shown);

    let prompt = format!("Minutes [{}]: ", config.conversation.default_minutes);
    let Some(line) = ask(&mut input, &prompt).await? else {
        chat.abandon();
        return Ok(());
    };
    chat.set_cooking_time_input(&line);
    let mut ticket = chat.submit_cooking_time();

    while let Some(current) = ticket.take() {
        print_transcript(&chat, &mut shown);
        chat.run(backend.as_ref(), current).await;
        print_transcript(&chat, &mut shown);

        let answer = match chat.step() {
            ConversationStep::Failed => {
                println!("{}", chat.error().unwrap_or("Unknown error"));
                ask(&mut input, "Try again? [y/N] ").await?
            }
            ConversationStep::Done => {
                let Some(recipe) = chat.recipe().cloned() else {
                    break;
                };
                let mut view = RecipeView::new(recipe, chat.request().cloned());
                view.record_history(backend.as_ref(), context.is_signed_in()).await;
                show_recipe(&mut view, Arc::clone(&backend), context, image, email.as_deref(), save).await;
                ask(&mut input, "Another idea? [y/N] ").await?
            }
            _ => None,
        };
        if answer.is_some_and(|a| a.trim().eq_ignore_ascii_case("y")) {
            let different_idea = chat.step() == ConversationStep::Done;
            ticket = chat.retry(different_idea);
        }
    }
    Ok(())
}

async fn show_recipe(
    view: &mut RecipeView,
    backend: Arc<dyn Backend>,
    context: &AppContext,
    image: bool,
    email: Option<&str>,
    save: bool,
) {
    println!("\n{}\n", render::recipe(view.recipe()));

    if image {
        let late = view
            .load_image(Arc::clone(&backend), context.config().image_timeout)
            .await;
        println!("{}", render::image(view.image()));
        if let Some(late) = late {
            match tokio::time::timeout(context.config().request_timeout, late).await {
                Ok(Ok(result)) => {
                    if view.apply_late_image(result) {
                        println!("{}", render::image(view.image()));
                    }
                }
                Ok(Err(e)) => debug!(error = %e, "Late image task failed"),
                Err(_) => debug!("Gave up waiting for a late image"),
            }
        }
    }
    if let Some(address) = email {
        // Failures are reported through the notice queue.
        let _ = view.send_email(backend.as_ref(), address).await;
    }
    if save {
        if let SaveOutcome::Saved(id) = view.save(backend.as_ref()).await {
            println!("Saved as {}", id);
        }
    }
    print_notices(view.notices_mut());
}

async fn run_saved(
    context: &AppContext,
    backend: &dyn Backend,
    favorites: bool,
    search: Option<String>,
    sort: fime::cli::SortArg,
    desc: bool,
) -> Result<()> {
    let mut saved = SavedRecipes::default();
    if saved.load(backend).await.is_err() {
        if favorites {
            saved.show_cached_favorites(context.favorites());
        }
        print_notices(saved.notices_mut());
        if !favorites {
            return Ok(());
        }
    }
    saved.set_favorites_only(favorites);
    if let Some(term) = search.as_deref() {
        saved.set_search(term);
    }
    let direction = if desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    saved.set_sort(sort.into(), direction);

    let visible = saved.visible();
    if visible.is_empty() {
        println!("No saved recipes.");
    }
    for recipe in visible {
        println!("{}", render::saved_row(recipe));
    }
    Ok(())
}

async fn run_favorite(context: &mut AppContext, backend: &dyn Backend, id: &str) -> Result<()> {
    let mut saved = SavedRecipes::default();
    if saved.load(backend).await.is_ok() {
        match saved.toggle_favorite(backend, id, context.favorites_mut()).await {
            Some(outcome) if outcome.is_confirmed() => {
                let favorited = saved.get(id).is_some_and(|r| r.favorited);
                println!(
                    "{} {}",
                    id,
                    if favorited { "added to favorites" } else { "removed from favorites" }
                );
            }
            Some(_) => {}
            None => println!("No saved recipe with id {}", id),
        }
    }
    print_notices(saved.notices_mut());
    Ok(())
}

async fn run_delete(context: &mut AppContext, backend: &dyn Backend, id: &str) -> Result<()> {
    let mut saved = SavedRecipes::default();
    if saved.load(backend).await.is_ok()
        && saved.delete(backend, id, context.favorites_mut()).await.is_none()
    {
        println!("No saved recipe with id {}", id);
    }
    print_notices(saved.notices_mut());
    Ok(())
}

async fn run_history(backend: &dyn Backend) -> Result<()> {
    let mut history = SearchHistory::default();
    if history.load(backend).await.is_ok() {
        if history.entries().is_empty() {
            println!("No searches yet.");
        }
        for entry in history.entries() {
            println!("{}", render::history_entry(entry));
        }
    }
    print_notices(history.notices_mut());
    Ok(())
}

const TASKS_HELP: &str = "commands: add <title> [!high|!medium|!low] [#tag] [@YYYY-MM-DD] | done <n> | rm <n> | list | stats | tag <name> [color] | quit";

/// Splits `add` arguments into the title and its markers.
fn parse_new_task(args: &str, store: &TaskStore) -> Result<NewTask, String> {
    let mut title = Vec::new();
    let mut task = NewTask::titled("", Priority::Medium);
    for word in args.split_whitespace() {
        if let Some(priority) = word.strip_prefix('!') {
            task.priority = priority.parse()?;
        } else if let Some(tag) = word.strip_prefix('#') {
            let tag = store
                .tag_named(tag)
                .ok_or_else(|| format!("Unknown tag: {}", tag))?;
            task.tags.push(tag.clone());
        } else if let Some(date) = word.strip_prefix('@') {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| format!("Invalid due date {}: {}", date, e))?;
            task.due_date = date.and_hms_opt(23, 59, 59).map(|d| d.and_utc());
        } else {
            title.push(word);
        }
    }
    if title.is_empty() {
        return Err("A task needs a title".to_string());
    }
    task.title = title.join(" ");
    Ok(task)
}

async fn run_tasks() -> Result<()> {
    let mut store = TaskStore::default();
    let mut input: Input = BufReader::new(io::stdin()).lines();
    println!("{}", TASKS_HELP);

    while let Some(line) = ask(&mut input, "tasks> ").await? {
        let (command, args) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        let nth = |store: &TaskStore| {
            args.trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| store.sorted().get(i).map(|t| t.id))
        };
        match command {
            "" => continue,
            "add" => match parse_new_task(args, &store) {
                Ok(task) => {
                    store.add_task(task);
                }
                Err(e) => println!("{}", e),
            },
            "done" => match nth(&store) {
                Some(id) => {
                    store.toggle_completion(id);
                }
                None => println!("No such task"),
            },
            "rm" => match nth(&store) {
                Some(id) => {
                    store.delete_task(id);
                }
                None => println!("No such task"),
            },
            "list" => {
                let now = Utc::now();
                for (n, task) in store.sorted().into_iter().enumerate() {
                    println!("{}", render::task(n + 1, task, now));
                }
            }
            "stats" => println!("{}", render::task_stats(&store.compute_stats())),
            "tag" => {
                let mut parts = args.split_whitespace();
                match parts.next() {
                    Some(name) => {
                        store.add_tag(name, parts.next().unwrap_or("#6b7280"));
                    }
                    None => println!("A tag needs a name"),
                }
            }
            "quit" | "exit" => break,
            _ => println!("{}", TASKS_HELP),
        }
        print_notices(store.notices_mut());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fime=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli_args = parse_args();
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let mut context = AppContext::start(config).await;

    match cli_args.command {
        Command::Parse { file } => {
            let raw = fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read response file '{}'", file.display()))?;
            let (recipe, path) = parse_with_path(&raw);
            debug!(?path, "Parsed response");
            println!("{}", render::recipe(&recipe));
        }
        Command::Tasks => run_tasks().await?,
        command => {
            let backend = context
                .backend()
                .context("Failed to set up the backend connection")?;
            match command {
                Command::Chat { image, email, save } => {
                    run_chat(&context, backend, image, email, save).await?
                }
                Command::Saved { favorites, search, sort, desc } => {
                    run_saved(&context, backend.as_ref(), favorites, search, sort, desc).await?
                }
                Command::Favorite { id } => run_favorite(&mut context, backend.as_ref(), &id).await?,
                Command::Delete { id } => run_delete(&mut context, backend.as_ref(), &id).await?,
                Command::History => run_history(backend.as_ref()).await?,
                Command::Parse { .. } | Command::Tasks => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_markers_are_parsed() {
        let store = TaskStore::default();
        let task = parse_new_task("Book flights !high #work @2025-06-01", &store).unwrap();
        assert_eq!(task.title, "Book flights");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.tags[0].name, "Work");
        assert_eq!(
            task.due_date.unwrap().format("%Y-%m-%d").to_string(),
            "2025-06-01"
        );
        assert!(parse_new_task("!low", &store).is_err());
        assert!(parse_new_task("x #nope", &store).is_err());
    }
}

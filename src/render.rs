//! Plain-text rendering for the terminal front-end.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::image::{ImageSlot, ImageSource};
use crate::recipe::{ChatMessage, Recipe, Role, SearchHistoryEntry};
use crate::tasks::{Task, TaskStats};

pub fn message(message: &ChatMessage) -> String {
    match message.role {
        Role::Assistant => format!("FiMe> {}", message.text),
        Role::User => format!("  you> {}", message.text),
    }
}

fn grams(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn strip_ordinal(step: &str) -> &str {
    let digits = step.len() - step.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        if let Some(rest) = step[digits..].strip_prefix(['.', ')']) {
            return rest.trim();
        }
    }
    step.trim()
}

pub fn recipe(recipe: &Recipe) -> String {
    let mut out = String::new();
    let heart = if recipe.favorited { " ♥" } else { "" };
    let _ = writeln!(out, "{}{}", recipe.name, heart);
    let _ = writeln!(out, "{}", "=".repeat(recipe.name.chars().count().max(3)));
    if recipe.cooking_time_minutes > 0 {
        let _ = writeln!(out, "Ready in {} minutes", recipe.cooking_time_minutes);
    }
    if !recipe.goals.is_empty() {
        let _ = writeln!(out, "Goals: {}", recipe.goals.join(", "));
    }

    let _ = writeln!(out, "\nIngredients:");
    if recipe.ingredients.is_empty() {
        let _ = writeln!(out, "  (none listed)");
    }
    for ingredient in &recipe.ingredients {
        let _ = writeln!(out, "  - {}", ingredient);
    }

    let _ = writeln!(out, "\nInstructions:");
    let steps = recipe.steps();
    if steps.is_empty() {
        let _ = writeln!(out, "  (none given)");
    }
    for (n, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", n + 1, strip_ordinal(step));
    }

    let _ = write!(
        out,
        "\nNutrition: {} kcal | protein {}g | carbs {}g | fat {}g",
        grams(recipe.calories),
        grams(recipe.protein_grams),
        grams(recipe.carb_grams),
        grams(recipe.fat_grams)
    );
    out
}

pub fn image(slot: &ImageSlot) -> String {
    match slot {
        ImageSlot::Empty => "Image: none".to_string(),
        ImageSlot::Loading => "Image: generating...".to_string(),
        ImageSlot::Ready { url, source: ImageSource::Generated } => format!("Image: {}", url),
        ImageSlot::Ready { url, source: ImageSource::Fallback } => format!("Image (stock photo): {}", url),
    }
}

fn date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn saved_row(recipe: &Recipe) -> String {
    format!(
        "{:<12} {} {:<32} {:>6} kcal {:>5}g protein {:>4} min  {}",
        recipe.id.as_deref().unwrap_or("-"),
        if recipe.favorited { "♥" } else { " " },
        recipe.name,
        grams(recipe.calories),
        grams(recipe.protein_grams),
        recipe.cooking_time_minutes,
        date(recipe.created_at)
    )
}

pub fn history_entry(entry: &SearchHistoryEntry) -> String {
    let goals: Vec<&str> = entry.goals.iter().map(|g| g.label()).collect();
    format!(
        "{}  {}\n    ingredients: {}\n    goals: {} | {} min",
        date(entry.created_at),
        entry.recipe.name,
        entry.ingredients,
        if goals.is_empty() { "-".to_string() } else { goals.join(", ") },
        entry.cooking_time_minutes
    )
}

/// One line per task; `index` is the 1-based position shown to the user.
pub fn task(index: usize, task: &Task, now: DateTime<Utc>) -> String {
    let mut line = format!(
        "{:>2}. [{}] {} ({})",
        index,
        if task.completed { "x" } else { " " },
        task.title,
        task.priority
    );
    if let Some(due) = task.due_date {
        let _ = write!(line, " due {}", due.format("%Y-%m-%d"));
        if task.is_overdue_at(now) {
            line.push_str(" OVERDUE");
        }
    }
    if !task.tags.is_empty() {
        let tags: Vec<&str> = task.tags.iter().map(|t| t.name.as_str()).collect();
        let _ = write!(line, " #{}", tags.join(" #"));
    }
    line
}

pub fn task_stats(stats: &TaskStats) -> String {
    format!(
        "{}/{} done ({}%) | high {} medium {} low {} | overdue {}",
        stats.completed,
        stats.total,
        stats.completion_rate,
        stats.priority_counts.high,
        stats.priority_counts.medium,
        stats.priority_counts.low,
        stats.overdue
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{NewTask, Priority, TaskStore};
    use chrono::TimeZone;

    #[test]
    fn recipe_with_defaults_still_renders() {
        let text = recipe(&Recipe::default());
        assert!(text.starts_with("Healthy Recipe\n"));
        assert!(text.contains("(none listed)"));
        assert!(text.ends_with("Nutrition: 0 kcal | protein 0g | carbs 0g | fat 0g"));
    }

    #[test]
    fn numbered_steps_are_not_double_numbered() {
        let r = Recipe {
            instructions: "1. Boil water.\n2) Add pasta.\n350 g of cheese on top".to_string(),
            protein_grams: 12.5,
            ..Recipe::default()
        };
        let text = recipe(&r);
        assert!(text.contains("  1. Boil water.\n  2. Add pasta.\n  3. 350 g of cheese on top\n"));
        assert!(text.contains("protein 12.5g"));
    }

    #[test]
    fn overdue_tasks_are_flagged() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let mut store = TaskStore::default();
        let mut new = NewTask::titled("File taxes", Priority::High);
        new.due_date = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        new.tags = store.tags()[..1].to_vec();
        let task = store.add_task(new);
        assert_eq!(
            super::task(1, &task, now),
            " 1. [ ] File taxes (high) due 2025-01-01 OVERDUE #Work"
        );
        assert_eq!(
            task_stats(&store.compute_stats_at(now)),
            "0/1 done (0%) | high 1 medium 0 low 0 | overdue 1"
        );
    }
}

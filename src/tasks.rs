//! In-memory task list with tags and derived statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::notify::Notices;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        })
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub tags: Vec<Tag>,
}

impl Task {
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }
}

/// Fields supplied by the user when creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub tags: Vec<Tag>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
            priority,
            tags: Vec::new(),
        }
    }
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub completed: usize,
    pub total: usize,
    /// Rounded percentage, 0 for an empty list.
    pub completion_rate: u32,
    pub priority_counts: PriorityCounts,
    pub overdue: usize,
}

pub fn default_tags() -> Vec<Tag> {
    [
        ("1", "Work", "#3b82f6"),
        ("2", "Personal", "#8b5cf6"),
        ("3", "Urgent", "#ef4444"),
        ("4", "Learning", "#10b981"),
    ]
    .into_iter()
    .map(|(id, name, color)| Tag {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

/// Incomplete before completed; incomplete by priority high to low,
/// completed newest first.
fn display_order(a: &Task, b: &Task) -> Ordering {
    match (a.completed, b.completed) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => a.priority.rank().cmp(&b.priority.rank()),
        (true, true) => b.created_at.cmp(&a.created_at),
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
    tags: Vec<Tag>,
    notices: Notices,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            tags: default_tags(),
            notices: Notices::default(),
        }
    }
}

impl TaskStore {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag_named(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    pub fn add_task(&mut self, new: NewTask) -> Task {
        self.add_task_at(new, Utc::now())
    }

    pub fn add_task_at(&mut self, new: NewTask, created_at: DateTime<Utc>) -> Task {
        let task = Task {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            completed: false,
            created_at,
            due_date: new.due_date,
            priority: new.priority,
            tags: new.tags,
        };
        self.tasks.insert(0, task.clone());
        self.notices.success("Task created", "Task created successfully");
        task
    }

    pub fn update_task(&mut self, id: Uuid, patch: TaskPatch) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        self.notices.success("Task updated", "Task updated successfully");
        true
    }

    pub fn delete_task(&mut self, id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let deleted = self.tasks.len() != before;
        if deleted {
            self.notices.success("Task deleted", "Task deleted successfully");
        }
        deleted
    }

    /// Returns the new completion state, or `None` for an unknown id.
    pub fn toggle_completion(&mut self, id: Uuid) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        let completed = task.completed;
        self.notices.info(
            "Task updated",
            if completed {
                "Task marked as completed"
            } else {
                "Task marked as incomplete"
            },
        );
        Some(completed)
    }

    pub fn add_tag(&mut self, name: impl Into<String>, color: impl Into<String>) -> Tag {
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            color: color.into(),
        };
        self.tags.push(tag.clone());
        self.notices.success("Tag created", format!("Tag {} created", tag.name));
        tag
    }

    pub fn compute_stats(&self) -> TaskStats {
        self.compute_stats_at(Utc::now())
    }

    pub fn compute_stats_at(&self, now: DateTime<Utc>) -> TaskStats {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        let completion_rate = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };
        let mut priority_counts = PriorityCounts::default();
        for task in &self.tasks {
            match task.priority {
                Priority::High => priority_counts.high += 1,
                Priority::Medium => priority_counts.medium += 1,
                Priority::Low => priority_counts.low += 1,
            }
        }
        TaskStats {
            completed,
            total,
            completion_rate,
            priority_counts,
            overdue: self.tasks.iter().filter(|t| t.is_overdue_at(now)).count(),
        }
    }

    pub fn sorted(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by(|a, b| display_order(a, b));
        tasks
    }
}

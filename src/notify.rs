use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A dismissible, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{}] {}: {}", marker, self.title, self.description)
    }
}

/// Pending notices, drained by whatever renders them.
#[derive(Debug, Default, Clone)]
pub struct Notices {
    queue: Vec<Notice>,
}

impl Notices {
    pub fn push(&mut self, level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) {
        self.queue.push(Notice {
            level,
            title: title.into(),
            description: description.into(),
        });
    }

    pub fn success(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Success, title, description);
    }

    pub fn info(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Info, title, description);
    }

    pub fn error(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.push(NoticeLevel::Error, title, description);
    }

    pub fn last(&self) -> Option<&Notice> {
        self.queue.last()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.queue)
    }
}

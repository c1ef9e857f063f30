use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Lifecycle of a task. Any state may move to any other; `Pending` is the start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status '{0}'. Must be: pending, in-progress, or done")]
pub struct InvalidStatus(pub String);

/// Accepted spellings, including values written by older clients.
const STATUS_TABLE: &[(&str, TaskStatus)] = &[
    ("pending", TaskStatus::Pending),
    ("por-hacer", TaskStatus::Pending),
    ("por hacer", TaskStatus::Pending),
    ("todo", TaskStatus::Pending),
    ("in-progress", TaskStatus::InProgress),
    ("en-progreso", TaskStatus::InProgress),
    ("en progreso", TaskStatus::InProgress),
    ("doing", TaskStatus::InProgress),
    ("done", TaskStatus::Done),
    ("hecho", TaskStatus::Done),
    ("completed", TaskStatus::Done),
];

/// Case and surrounding whitespace are ignored.
pub fn normalize_status(raw: &str) -> Result<TaskStatus, InvalidStatus> {
    let key = raw.trim().to_lowercase();
    STATUS_TABLE
        .iter()
        .find(|(spelling, _)| *spelling == key)
        .map(|(_, status)| *status)
        .ok_or_else(|| InvalidStatus(raw.to_string()))
}

impl FromStr for TaskStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_status(s)
    }
}

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::status::{normalize_status, TaskStatus};

/// Row as stored; `status` is plain text with a CHECK constraint.
#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub detail: Option<String>,
    pub due_at: Option<OffsetDateTime>,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub detail: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_at: Option<OffsetDateTime>,
    pub status: TaskStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TaskRow> for Task {
    type Error = anyhow::Error;

    fn try_from(r: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: normalize_status(&r.status)?,
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            detail: r.detail,
            due_at: r.due_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated insert payload.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub detail: Option<String>,
    pub due_at: Option<OffsetDateTime>,
    pub status: TaskStatus,
}

/// Validated update payload with no owner field. For `detail` and `due_at`
/// the outer `None` keeps the column and `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub detail: Option<Option<String>>,
    pub due_at: Option<Option<OffsetDateTime>>,
    pub status: Option<TaskStatus>,
}

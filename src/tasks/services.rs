use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateTaskRequest, UpdateTaskRequest},
    repo::TaskStore,
    repo_types::{NewTask, Task, TaskPatch},
    status::{normalize_status, TaskStatus},
};
use crate::{
    auth::services::non_blank,
    error::{AppError, AppResult},
};

fn parse_status(raw: Option<&str>) -> AppResult<Option<TaskStatus>> {
    raw.map(normalize_status)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Task operations, always scoped to the calling user.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<TaskStore>,
}

impl TaskService {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, req))]
    pub async fn create(&self, owner: Uuid, req: CreateTaskRequest) -> AppResult<Task> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("title is required".into()));
        }
        let draft = NewTask {
            title,
            detail: non_blank(req.detail),
            due_at: req.due_at,
            status: parse_status(req.status.as_deref())?.unwrap_or_default(),
        };
        let task = self.store.insert(owner, draft).await?;
        info!(task_id = %task.id, status = %task.status, "task created");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, owner: Uuid) -> AppResult<Vec<Task>> {
        Ok(self.store.list(owner).await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<Task> {
        self.store
            .find(owner, id)
            .await?
            .ok_or(AppError::NotFoundOrUnauthorized)
    }

    #[instrument(skip(self, req))]
    pub async fn update(&self, owner: Uuid, id: Uuid, req: UpdateTaskRequest) -> AppResult<Task> {
        let title = match req.title {
            Some(t) if t.trim().is_empty() => {
                return Err(AppError::Validation("title must not be blank".into()))
            }
            other => other.map(|t| t.trim().to_string()),
        };
        let patch = TaskPatch {
            title,
            detail: req.detail.map(non_blank),
            due_at: req.due_at,
            status: req
                .status
                .map(|raw| parse_status(raw.as_deref()).map(Option::unwrap_or_default))
                .transpose()?,
        };
        let task = self
            .store
            .update(owner, id, patch)
            .await?
            .ok_or(AppError::NotFoundOrUnauthorized)?;
        info!(task_id = %task.id, status = %task.status, "task updated");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<Task> {
        let task = self
            .store
            .delete(owner, id)
            .await?
            .ok_or(AppError::NotFoundOrUnauthorized)?;
        info!(task_id = %task.id, "task deleted");
        Ok(task)
    }
}

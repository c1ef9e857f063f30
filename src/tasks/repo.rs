use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewTask, Task, TaskPatch, TaskRow};
use crate::store::OwnedStore;

const TASK_COLUMNS: &str =
    "id, user_id, title, detail, due_at, status, created_at, updated_at";

pub type TaskStore = dyn OwnedStore<Record = Task, Draft = NewTask, Patch = TaskPatch>;

#[derive(Clone)]
pub struct PgTaskStore {
    db: PgPool,
}

impl PgTaskStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_task(row: Option<TaskRow>) -> anyhow::Result<Option<Task>> {
    row.map(Task::try_from).transpose()
}

#[async_trait]
impl OwnedStore for PgTaskStore {
    type Record = Task;
    type Draft = NewTask;
    type Patch = TaskPatch;

    async fn insert(&self, owner: Uuid, draft: NewTask) -> anyhow::Result<Task> {
        let sql = format!(
            r#"
            INSERT INTO tasks (id, user_id, title, detail, due_at, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TASK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&draft.title)
            .bind(&draft.detail)
            .bind(draft.due_at)
            .bind(draft.status.as_str())
            .fetch_one(&self.db)
            .await
            .context("insert task")?;
        row.try_into()
    }

    async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<Task>> {
        let sql = format!(
            r#"
            SELECT {TASK_COLUMNS}
              FROM tasks
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "#
        );
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await
            .context("list tasks")?
            .into_iter()
            .map(Task::try_from)
            .collect()
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await
            .context("find task")?;
        into_task(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> anyhow::Result<Option<Task>> {
        let sql = format!(
            r#"
            UPDATE tasks
               SET title      = COALESCE($3, title),
                   detail     = CASE WHEN $4 THEN $5 ELSE detail END,
                   due_at     = CASE WHEN $6 THEN $7 ELSE due_at END,
                   status     = COALESCE($8, status),
                   updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {TASK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&patch.title)
            .bind(patch.detail.is_some())
            .bind(patch.detail.flatten())
            .bind(patch.due_at.is_some())
            .bind(patch.due_at.flatten())
            .bind(patch.status.map(|s| s.as_str()))
            .fetch_optional(&self.db)
            .await
            .context("update task")?;
        into_task(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Task>> {
        let sql = format!(
            "DELETE FROM tasks WHERE id = $1 AND user_id = $2 RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await
            .context("delete task")?;
        into_task(row)
    }
}

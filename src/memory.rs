//! In-memory store and mailer implementations for tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{NewUser, ProfilePatch, User},
    },
    mailer::{Mailer, OutgoingEmail},
    store::OwnedStore,
    tasks::repo_types::{NewTask, Task, TaskPatch},
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
    resets: RwLock<HashMap<Uuid, (String, OffsetDateTime)>>,
    fail_reset_write: Mutex<bool>,
}

impl MemoryUserStore {
    pub async fn reset_token_hash(&self, id: Uuid) -> Option<String> {
        self.resets.read().await.get(&id).map(|(hash, _)| hash.clone())
    }

    pub fn fail_next_reset_write(&self) {
        *self.fail_reset_write.lock().unwrap() = true;
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            last_name: new.last_name,
            age: new.age,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(age) = patch.age {
            user.age = Some(age);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn store_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        if std::mem::take(&mut *self.fail_reset_write.lock().unwrap()) {
            anyhow::bail!("database unavailable");
        }
        if self.users.read().await.contains_key(&id) {
            self.resets
                .write()
                .await
                .insert(id, (token_hash.to_string(), expires_at));
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        email: &str,
        token_hash: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let now = OffsetDateTime::now_utc();
        let mut users = self.users.write().await;
        let mut resets = self.resets.write().await;
        let Some(user) = users.values_mut().find(|u| {
            u.email == email
                && resets
                    .get(&u.id)
                    .is_some_and(|(hash, exp)| hash == token_hash && *exp > now)
        }) else {
            return Ok(None);
        };
        resets.remove(&user.id);
        user.password_hash = new_password_hash.to_string();
        user.updated_at = now;
        Ok(Some(user.clone()))
    }
}

/// Keeps insertion order so listing newest-first is deterministic.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<Vec<Task>>,
}

#[async_trait]
impl OwnedStore for MemoryTaskStore {
    type Record = Task;
    type Draft = NewTask;
    type Patch = TaskPatch;

    async fn insert(&self, owner: Uuid, draft: NewTask) -> anyhow::Result<Task> {
        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: owner,
            title: draft.title,
            detail: draft.detail,
            due_at: draft.due_at,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .rev()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect())
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .find(|t| t.id == id && t.user_id == owner)
            .cloned())
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: TaskPatch,
    ) -> anyhow::Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id && t.user_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(detail) = patch.detail {
            task.detail = detail;
        }
        if let Some(due_at) = patch.due_at {
            task.due_at = due_at;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        task.updated_at = OffsetDateTime::now_utc();
        Ok(Some(task.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks
            .iter()
            .position(|t| t.id == id && t.user_id == owner)
            .map(|i| tasks.remove(i)))
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail_next: Mutex<bool>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            anyhow::bail!("mail provider unavailable");
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

//! Persistence for users, their sessions, and their tasks.
//!
//! Handlers only see the [`Store`] trait object. Every task operation takes the owner
//! id alongside the task id, so a lookup can never reach another user's task.
//! Two backends exist:
//!
//! - [`postgres::PgStore`], the production backend (sqlx, embedded migrations);
//! - [`memory::MemoryStore`], a process-local backend selected with
//!   `DATABASE_URL=memory://` and used by the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NewUser, Task, TaskListQuery, TaskUpdate, User, UserChanges};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Credential store: user records, avatars, and active session tokens.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. A duplicate email fails with `BadRequest`.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// `email` must already be normalized (trimmed, lower-cased).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Applies `changes` in one write and bumps `updated_at`.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError>;

    /// Deletes the user's tasks, sessions and then the user, as one unit.
    async fn delete_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Replaces (or clears, with `None`) the stored avatar. Returns false for an unknown user.
    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<bool, AppError>;

    async fn avatar(&self, id: Uuid) -> Result<Option<Vec<u8>>, AppError>;

    async fn add_token(&self, user_id: Uuid, token: &str) -> Result<(), AppError>;

    /// Resolves a user only if `token` is still in that user's active set.
    async fn find_user_by_token(&self, user_id: Uuid, token: &str)
        -> Result<Option<User>, AppError>;

    /// Removes exactly one token. Returns whether it was present.
    async fn remove_token(&self, user_id: Uuid, token: &str) -> Result<bool, AppError>;

    /// Removes every token of the user and returns how many there were.
    async fn clear_tokens(&self, user_id: Uuid) -> Result<u64, AppError>;
}

/// Resource store: tasks, always addressed together with their owner.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts a task. Fails with `BadRequest` if the owner does not exist.
    async fn insert_task(&self, task: Task) -> Result<Task, AppError>;

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError>;

    async fn list_tasks_by_owner(
        &self,
        owner: Uuid,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, AppError>;

    /// Conditional update on `(id, owner)`; `None` if no such task.
    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &TaskUpdate,
    ) -> Result<Option<Task>, AppError>;

    /// Conditional delete on `(id, owner)`; returns the removed task.
    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<Option<Task>, AppError>;
}

#[async_trait]
pub trait Store: UserStore + TaskStore {
    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Opens the backend named by `config.database_url`, running migrations for PostgreSQL.
pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, AppError> {
    if config.uses_memory_store() {
        log::warn!("using the in-memory store; data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

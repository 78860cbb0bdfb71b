//! Task repository trait
//!
//! Defines the interface for the `todos` row-store.

use async_trait::async_trait;

use super::model::{NewTask, Task, TaskPatch};
use crate::Result;

/// Repository interface for task CRUD operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// All tasks owned by `user_id`, newest first
    async fn list_for_owner(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Insert a new task and return the stored row
    async fn insert(&self, task: NewTask) -> Result<Task>;

    /// Apply `patch` to the task with the given id
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()>;

    /// Delete a task by id. Deleting an absent id succeeds.
    async fn delete(&self, id: &str) -> Result<()>;
}

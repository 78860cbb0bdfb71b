//! Task entry form
//!
//! Creates a new task, or saves the title of a task handed in for editing.
//! On success the parent list is reloaded.

use std::sync::Arc;

use tracing::error;

use super::task_list::TaskList;
use crate::backend::Backend;
use crate::task::{normalize_title, EditingState, NewTask, TaskPatch};

pub struct TaskEntry {
    backend: Arc<dyn Backend>,
    title: String,
    loading: bool,
    editing: Option<EditingState>,
}

impl TaskEntry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            title: String::new(),
            loading: false,
            editing: None,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Switch to editing `editing`, or back to creating with `None`.
    ///
    /// The field is refilled from the editing pair.
    pub fn set_editing(&mut self, editing: Option<EditingState>) {
        self.title = editing
            .as_ref()
            .map(|e| e.title.clone())
            .unwrap_or_default();
        self.editing = editing;
    }

    /// Empty the field and leave edit mode
    pub fn reset(&mut self) {
        self.title.clear();
        self.editing = None;
    }

    /// Save the field. Returns `true` when something was persisted.
    ///
    /// Blank titles are ignored. On failure the field keeps its text.
    pub async fn submit(&mut self, list: &mut TaskList) -> bool {
        if self.loading {
            return false;
        }
        let Some(title) = normalize_title(&self.title) else {
            return false;
        };

        self.loading = true;
        let saved = match self.editing.clone() {
            Some(editing) => self.save_edit(&editing, title).await,
            None => self.create(title).await,
        };

        if saved {
            self.title.clear();
            if self.editing.take().is_some() {
                list.clear_editing();
            }
            list.load().await;
        }
        self.loading = false;
        saved
    }

    async fn save_edit(&self, editing: &EditingState, title: String) -> bool {
        match self
            .backend
            .update(&editing.task_id, TaskPatch::title(title))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!("Error updating task {}: {}", editing.task_id, e);
                false
            }
        }
    }

    async fn create(&self, title: String) -> bool {
        let user = match self.backend.get_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                error!("Cannot add a task without a signed-in user");
                return false;
            }
            Err(e) => {
                error!("Error resolving current user: {}", e);
                return false;
            }
        };

        let task = NewTask {
            title,
            completed: false,
            user_id: user.id,
        };
        match self.backend.insert(task).await {
            Ok(_) => true,
            Err(e) => {
                error!("Error adding task: {}", e);
                false
            }
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn editing(&self) -> Option<&EditingState> {
        self.editing.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The save button is disabled for blank input or while saving
    pub fn can_submit(&self) -> bool {
        !self.loading && normalize_title(&self.title).is_some()
    }
}

//! Task list controller
//!
//! Loads the current user's tasks and offers toggle, delete and inline
//! edit. Every successful mutation is followed by a full reload; failures
//! are logged and the previous list stays on screen.

use std::sync::Arc;

use tracing::{debug, error};

use crate::backend::Backend;
use crate::task::{normalize_title, EditingState, Task, TaskPatch};
use crate::Result;

pub const EMPTY_LIST_HINT: &str = "No tasks yet. Add one above!";

/// A task together with the affordances its row offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRow<'a> {
    pub task: &'a Task,
    pub editing: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

pub struct TaskList {
    backend: Arc<dyn Backend>,
    tasks: Vec<Task>,
    loading: bool,
    editing: Option<EditingState>,
}

impl TaskList {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            tasks: Vec::new(),
            loading: false,
            editing: None,
        }
    }

    /// Reload the signed-in user's tasks, newest first.
    ///
    /// A successful reload discards any inline edit in progress.
    pub async fn load(&mut self) {
        self.loading = true;
        match self.fetch().await {
            Ok(Some(tasks)) => {
                debug!("Loaded {} tasks", tasks.len());
                self.tasks = tasks;
                self.editing = None;
            }
            Ok(None) => debug!("No signed-in user, keeping the current list"),
            Err(e) => error!("Error loading tasks: {}", e),
        }
        self.loading = false;
    }

    async fn fetch(&self) -> Result<Option<Vec<Task>>> {
        let Some(user) = self.backend.get_user().await? else {
            return Ok(None);
        };
        self.backend.list_for_owner(&user.id).await.map(Some)
    }

    /// Flip `completed` for a task. Returns `true` when the backend accepted it.
    pub async fn toggle_complete(&mut self, id: &str, completed: bool) -> bool {
        match self
            .backend
            .update(id, TaskPatch::completed(!completed))
            .await
        {
            Ok(()) => {
                self.load().await;
                true
            }
            Err(e) => {
                error!("Error toggling task {}: {}", id, e);
                false
            }
        }
    }

    /// Delete a task. Returns `true` when the backend accepted it.
    pub async fn delete(&mut self, id: &str) -> bool {
        match self.backend.delete(id).await {
            Ok(()) => {
                self.load().await;
                true
            }
            Err(e) => {
                error!("Error deleting task {}: {}", id, e);
                false
            }
        }
    }

    /// Start editing the task with `id`, abandoning any other draft.
    ///
    /// Returns `false` if the task is not in the list.
    pub fn start_edit(&mut self, id: &str) -> bool {
        match self.tasks.iter().find(|t| t.id == id) {
            Some(task) => {
                self.editing = Some(EditingState::for_task(task));
                true
            }
            None => false,
        }
    }

    /// Replace the draft title of the task being edited
    pub fn set_edit_text(&mut self, text: impl Into<String>) {
        if let Some(editing) = &mut self.editing {
            editing.title = text.into();
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Save the draft title. No-op when nothing is being edited or the
    /// draft is blank.
    pub async fn confirm_edit(&mut self) -> bool {
        let Some(editing) = self.editing.clone() else {
            return false;
        };
        let Some(title) = normalize_title(&editing.title) else {
            return false;
        };

        self.loading = true;
        let saved = match self
            .backend
            .update(&editing.task_id, TaskPatch::title(title))
            .await
        {
            Ok(()) => {
                self.load().await;
                self.editing = None;
                true
            }
            Err(e) => {
                error!("Error updating task {}: {}", editing.task_id, e);
                false
            }
        };
        self.loading = false;
        saved
    }

    /// Drop the inline edit without touching the backend
    pub fn clear_editing(&mut self) {
        self.editing = None;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task at a zero-based position in the displayed list
    pub fn task_at(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn editing(&self) -> Option<&EditingState> {
        self.editing.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Full-screen loading is only shown before anything has been loaded
    pub fn shows_loading_indicator(&self) -> bool {
        self.loading && self.tasks.is_empty()
    }

    pub fn rows(&self) -> Vec<TaskRow<'_>> {
        let editing_id = self.editing.as_ref().map(|e| e.task_id.as_str());
        self.tasks
            .iter()
            .map(|task| {
                let editing = editing_id == Some(task.id.as_str());
                TaskRow {
                    task,
                    editing,
                    can_edit: !task.completed && !editing,
                    can_delete: !editing,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthBackend, InMemoryBackend, Operation};
    use crate::task::{NewTask, TaskRepository};

    async fn setup(titles: &[&str]) -> (Arc<InMemoryBackend>, TaskList) {
        let backend = Arc::new(InMemoryBackend::new());
        let session = backend.sign_up("a@x.com", "secret1").await.unwrap().unwrap();
        for title in titles {
            backend
                .insert(NewTask::new(title, &session.user.id).unwrap())
                .await
                .unwrap();
        }
        let mut list = TaskList::new(backend.clone());
        list.load().await;
        (backend, list)
    }

    fn titles(list: &TaskList) -> Vec<&str> {
        list.tasks().iter().map(|t| t.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_newest_first() {
        let (_backend, list) = setup(&["one", "two", "three"]).await;
        assert_eq!(titles(&list), vec!["three", "two", "one"]);
        assert!(!list.is_loading());
        assert!(!list.shows_loading_indicator());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_list() {
        let (backend, mut list) = setup(&["one"]).await;
        backend.fail_next(Operation::List, "timeout").await;

        list.load().await;
        assert_eq!(titles(&list), vec!["one"]);
    }

    #[tokio::test]
    async fn test_load_without_user_keeps_list() {
        let (backend, mut list) = setup(&["one"]).await;
        backend.sign_out().await.unwrap();

        list.load().await;
        assert_eq!(titles(&list), vec!["one"]);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_value() {
        let (_backend, mut list) = setup(&["one"]).await;
        let id = list.tasks()[0].id.clone();

        assert!(list.toggle_complete(&id, false).await);
        assert!(list.tasks()[0].completed);

        assert!(list.toggle_complete(&id, true).await);
        assert!(!list.tasks()[0].completed);
    }

    #[tokio::test]
    async fn test_toggle_failure_is_swallowed() {
        let (backend, mut list) = setup(&["one"]).await;
        let id = list.tasks()[0].id.clone();
        backend.fail_next(Operation::Update, "boom").await;

        assert!(!list.toggle_complete(&id, false).await);
        assert!(!list.tasks()[0].completed);
    }

    #[tokio::test]
    async fn test_delete_removes_and_is_idempotent() {
        let (_backend, mut list) = setup(&["one", "two"]).await;
        let id = list.tasks()[0].id.clone();

        assert!(list.delete(&id).await);
        assert_eq!(titles(&list), vec!["one"]);

        assert!(list.delete(&id).await);
        assert_eq!(titles(&list), vec!["one"]);
    }

    #[tokio::test]
    async fn test_cancel_edit_leaves_title() {
        let (backend, mut list) = setup(&["one"]).await;
        let id = list.tasks()[0].id.clone();

        assert!(list.start_edit(&id));
        list.set_edit_text("changed");
        list.cancel_edit();

        assert!(list.editing().is_none());
        assert_eq!(backend.all_tasks().await[0].title, "one");
    }

    #[tokio::test]
    async fn test_confirm_edit_updates_title() {
        let (backend, mut list) = setup(&["one"]).await;
        let id = list.tasks()[0].id.clone();

        list.start_edit(&id);
        list.set_edit_text("  renamed ");
        assert!(list.confirm_edit().await);

        assert!(list.editing().is_none());
        assert_eq!(titles(&list), vec!["renamed"]);
        assert_eq!(backend.all_tasks().await[0].title, "renamed");
    }

    #[tokio::test]
    async fn test_confirm_blank_edit_is_noop() {
        let (backend, mut list) = setup(&["one"]).await;
        let id = list.tasks()[0].id.clone();

        list.start_edit(&id);
        list.set_edit_text("   ");
        assert!(!list.confirm_edit().await);

        assert!(list.editing().is_some());
        assert_eq!(backend.all_tasks().await[0].title, "one");
    }

    #[tokio::test]
    async fn test_confirm_edit_failure_keeps_draft() {
        let (backend, mut list) = setup(&["one"]).await;
        let id = list.tasks()[0].id.clone();
        backend.fail_next(Operation::Update, "boom").await;

        list.start_edit(&id);
        list.set_edit_text("renamed");
        assert!(!list.confirm_edit().await);

        assert_eq!(list.editing().unwrap().title, "renamed");
        assert!(!list.is_loading());
    }

    #[tokio::test]
    async fn test_single_edit_at_a_time() {
        let (_backend, mut list) = setup(&["a", "b"]).await;
        let first = list.tasks()[0].id.clone();
        let second = list.tasks()[1].id.clone();

        list.start_edit(&first);
        list.set_edit_text("draft for first");
        list.start_edit(&second);

        let editing = list.editing().unwrap();
        assert_eq!(editing.task_id, second);
        assert_eq!(editing.title, "a");

        let rows = list.rows();
        assert_eq!(rows.iter().filter(|r| r.editing).count(), 1);
        assert!(!list.start_edit("missing"));
    }

    #[tokio::test]
    async fn test_row_affordances() {
        let (_backend, mut list) = setup(&["open", "done"]).await;
        let done = list.tasks()[0].id.clone();
        let open = list.tasks()[1].id.clone();
        list.toggle_complete(&done, false).await;
        list.start_edit(&open);

        let rows = list.rows();
        let done_row = rows.iter().find(|r| r.task.id == done).unwrap();
        assert!(!done_row.can_edit);
        assert!(done_row.can_delete);

        let open_row = rows.iter().find(|r| r.task.id == open).unwrap();
        assert!(open_row.editing);
        assert!(!open_row.can_edit);
        assert!(!open_row.can_delete);
    }

    #[tokio::test]
    async fn test_reload_discards_unrelated_edit() {
        let (_backend, mut list) = setup(&["a", "b"]).await;
        let first = list.tasks()[0].id.clone();
        let second = list.tasks()[1].id.clone();

        list.start_edit(&first);
        list.toggle_complete(&second, false).await;
        assert!(list.editing().is_none());
    }
}

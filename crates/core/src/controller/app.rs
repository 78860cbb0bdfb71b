//! App shell
//!
//! Gates between the auth form and the task views based on the session.

use std::sync::Arc;

use tracing::info;

use super::auth_form::AuthForm;
use super::session::SessionController;
use super::task_entry::TaskEntry;
use super::task_list::TaskList;
use crate::auth::Session;
use crate::backend::Backend;

/// Which top-level view is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Initial session fetch in flight
    Loading,
    SignedOut,
    SignedIn,
}

/// Views that only exist while signed in
struct TaskViews {
    /// Owner of the loaded list
    user_id: String,
    list: TaskList,
    entry: TaskEntry,
}

pub struct App {
    backend: Arc<dyn Backend>,
    session: SessionController,
    auth_form: AuthForm,
    tasks: Option<TaskViews>,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            session: SessionController::new(Arc::clone(&backend)),
            auth_form: AuthForm::new(Arc::clone(&backend)),
            tasks: None,
            backend,
        }
    }

    /// Fetch the session, subscribe to changes, and show the matching view
    pub async fn mount(&mut self) {
        self.session.mount().await;
        self.sync().await;
    }

    /// Mount or discard the task views to match the session.
    ///
    /// A token refresh keeps the mounted views as they are; a different
    /// user gets freshly loaded ones.
    pub async fn sync(&mut self) {
        let user_id = self.session.session().map(|s| s.user.id);
        let mounted = self.tasks.as_ref().map(|v| v.user_id.as_str());
        if user_id.as_deref() == mounted {
            return;
        }

        match user_id {
            Some(user_id) => {
                info!("Session active for user {}, showing tasks", user_id);
                let mut views = TaskViews {
                    user_id,
                    list: TaskList::new(Arc::clone(&self.backend)),
                    entry: TaskEntry::new(Arc::clone(&self.backend)),
                };
                views.list.load().await;
                self.tasks = Some(views);
            }
            None => {
                info!("No session, showing sign-in");
                self.tasks = None;
            }
        }
    }

    /// Wait for the next session change, then resync the views.
    ///
    /// Returns `false` once no further changes can arrive.
    pub async fn session_changed(&mut self) -> bool {
        let alive = self.session.changed().await;
        self.sync().await;
        alive
    }

    /// Sign out and hand back a fresh auth form. Returns `true` on success.
    pub async fn logout(&mut self) -> bool {
        if !self.session.logout().await {
            return false;
        }
        self.auth_form.reset();
        self.sync().await;
        true
    }

    /// Save the entry form into the task list
    pub async fn submit_entry(&mut self) -> bool {
        match &mut self.tasks {
            Some(views) => views.entry.submit(&mut views.list).await,
            None => false,
        }
    }

    /// Release the session subscription
    pub async fn teardown(&mut self) {
        self.session.teardown().await;
    }

    pub fn screen(&self) -> Screen {
        if self.session.is_loading() {
            Screen::Loading
        } else if self.session.is_authenticated() {
            Screen::SignedIn
        } else {
            Screen::SignedOut
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session.session()
    }

    pub fn session_controller(&self) -> &SessionController {
        &self.session
    }

    pub fn auth_form(&self) -> &AuthForm {
        &self.auth_form
    }

    pub fn auth_form_mut(&mut self) -> &mut AuthForm {
        &mut self.auth_form
    }

    pub fn task_list(&self) -> Option<&TaskList> {
        self.tasks.as_ref().map(|v| &v.list)
    }

    pub fn task_list_mut(&mut self) -> Option<&mut TaskList> {
        self.tasks.as_mut().map(|v| &mut v.list)
    }

    pub fn task_entry(&self) -> Option<&TaskEntry> {
        self.tasks.as_ref().map(|v| &v.entry)
    }

    pub fn task_entry_mut(&mut self) -> Option<&mut TaskEntry> {
        self.tasks.as_mut().map(|v| &mut v.entry)
    }
}

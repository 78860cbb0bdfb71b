//! In-process backend
//!
//! Mirrors the hosted service closely enough for tests and offline use:
//! same error messages, same ownership policy on rows, same
//! session-change notifications.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthBackend;
use crate::auth::{AuthChangeEvent, AuthEvents, AuthSubscription, Session, User};
use crate::task::{NewTask, Task, TaskPatch, TaskRepository};
use crate::{Error, Result};

const SESSION_TTL_SECONDS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

/// Backend operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSession,
    SignIn,
    SignUp,
    SignOut,
    ResetPassword,
    GetUser,
    List,
    Insert,
    Update,
    Delete,
}

impl Operation {
    fn is_data(self) -> bool {
        matches!(
            self,
            Self::List | Self::Insert | Self::Update | Self::Delete
        )
    }
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    tasks: HashMap<String, Task>,
    last_created_at: Option<DateTime<Utc>>,
    reset_requests: Vec<String>,
    failures: HashMap<Operation, String>,
}

impl State {
    fn take_failure(&mut self, op: Operation) -> Result<()> {
        match self.failures.remove(&op) {
            Some(message) if op.is_data() => Err(Error::Api {
                status: 500,
                message,
            }),
            Some(message) => Err(Error::auth(message)),
            None => Ok(()),
        }
    }

    fn current_user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.id.as_str())
    }

    /// Strictly increasing creation timestamps keep newest-first ordering total
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn issue_session(user: &User) -> Session {
    Session {
        access_token: Uuid::new_v4().to_string(),
        token_type: "bearer".to_string(),
        expires_in: SESSION_TTL_SECONDS,
        expires_at: None,
        refresh_token: Uuid::new_v4().simple().to_string(),
        user: user.clone(),
    }
    .normalized(Utc::now())
}

/// Auth service and `todos` table held in memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
    events: AuthEvents,
    require_email_confirmation: bool,
}

impl InMemoryBackend {
    /// Create an empty backend where sign-up signs the user in directly
    pub fn new() -> Self {
        Self::default()
    }

    /// Require new accounts to verify their address before signing in
    pub fn with_email_confirmation(mut self, required: bool) -> Self {
        self.require_email_confirmation = required;
        self
    }

    /// Complete the verification step for `email`
    pub async fn confirm_email(&self, email: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&normalize_email(email))
            .ok_or_else(|| Error::auth("User not found"))?;
        account.user.email_confirmed_at = Some(Utc::now());
        Ok(())
    }

    /// Make the next call of `op` fail with `message`
    pub async fn fail_next(&self, op: Operation, message: impl Into<String>) {
        self.state.write().await.failures.insert(op, message.into());
    }

    /// Addresses for which a reset email was requested, oldest first
    pub async fn password_reset_requests(&self) -> Vec<String> {
        self.state.read().await.reset_requests.clone()
    }

    /// Number of live session-change subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    /// Every stored row regardless of owner, newest first
    pub async fn all_tasks(&self) -> Vec<Task> {
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }
}

#[async_trait]
impl AuthBackend for InMemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::GetSession)?;
        Ok(state.session.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let session = {
            let mut state = self.state.write().await;
            state.take_failure(Operation::SignIn)?;

            let account = state
                .accounts
                .get(&normalize_email(email))
                .filter(|a| a.password == password)
                .cloned()
                .ok_or_else(|| Error::Auth {
                    status: Some(400),
                    message: "Invalid login credentials".into(),
                })?;

            if self.require_email_confirmation && account.user.email_confirmed_at.is_none() {
                return Err(Error::Auth {
                    status: Some(400),
                    message: "Email not confirmed".into(),
                });
            }

            let session = issue_session(&account.user);
            state.session = Some(session.clone());
            session
        };

        info!("Signed in user {}", session.user.id);
        self.events
            .emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let session = {
            let mut state = self.state.write().await;
            state.take_failure(Operation::SignUp)?;

            let email = normalize_email(email);
            if email.is_empty() || !email.contains('@') {
                return Err(Error::Auth {
                    status: Some(400),
                    message: "Unable to validate email address: invalid format".into(),
                });
            }
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(Error::Auth {
                    status: Some(422),
                    message: "Password should be at least 6 characters.".into(),
                });
            }
            if state.accounts.contains_key(&email) {
                return Err(Error::Auth {
                    status: Some(422),
                    message: "User already registered".into(),
                });
            }

            let user = User {
                id: Uuid::new_v4().to_string(),
                email: Some(email.clone()),
                email_confirmed_at: if self.require_email_confirmation {
                    None
                } else {
                    Some(Utc::now())
                },
            };
            state.accounts.insert(
                email,
                Account {
                    user: user.clone(),
                    password: password.to_string(),
                },
            );
            debug!("Registered user {}", user.id);

            if self.require_email_confirmation {
                return Ok(None);
            }

            let session = issue_session(&user);
            state.session = Some(session.clone());
            session
        };

        self.events
            .emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.take_failure(Operation::SignOut)?;
            state.session = None;
        }
        info!("Signed out");
        self.events.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::ResetPassword)?;
        // Unknown addresses succeed too, so accounts cannot be probed
        state.reset_requests.push(normalize_email(email));
        Ok(())
    }

    async fn get_user(&self) -> Result<Option<User>> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::GetUser)?;
        Ok(state.session.as_ref().map(|s| s.user.clone()))
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

#[async_trait]
impl TaskRepository for InMemoryBackend {
    async fn list_for_owner(&self, user_id: &str) -> Result<Vec<Task>> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::List)?;

        if state.current_user_id() != Some(user_id) {
            return Ok(Vec::new());
        }

        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn insert(&self, task: NewTask) -> Result<Task> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Insert)?;

        if state.current_user_id() != Some(task.user_id.as_str()) {
            return Err(Error::Api {
                status: 403,
                message: "new row violates row-level security policy for table \"todos\"".into(),
            });
        }

        let created_at = state.next_created_at();
        let stored = Task {
            id: Uuid::new_v4().to_string(),
            title: task.title,
            completed: task.completed,
            user_id: task.user_id,
            created_at: Some(created_at),
        };
        state.tasks.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Update)?;

        let owner = state.current_user_id().map(str::to_string);
        if let Some(task) = state
            .tasks
            .get_mut(id)
            .filter(|t| Some(&t.user_id) == owner.as_ref())
        {
            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Delete)?;

        let owned = match (state.tasks.get(id), state.current_user_id()) {
            (Some(task), Some(user_id)) => task.user_id == user_id,
            _ => false,
        };
        if owned {
            state.tasks.remove(id);
        }
        Ok(())
    }
}

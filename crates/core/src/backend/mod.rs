//! Backend module
//!
//! The hosted auth + row-store service is consumed through two traits.
//! [`SupabaseClient`] talks to the real service over HTTP, and
//! [`InMemoryBackend`] keeps everything in process.

mod memory;
mod supabase;

use async_trait::async_trait;

use crate::auth::{AuthSubscription, Session, User};
use crate::task::TaskRepository;
use crate::Result;

pub use memory::{InMemoryBackend, Operation};
pub use supabase::{SupabaseClient, SupabaseConfig};

/// Session operations of the auth service
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, if any
    async fn get_session(&self) -> Result<Option<Session>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Register a new account.
    ///
    /// Returns `None` while the address still has to be verified.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>>;

    async fn sign_out(&self) -> Result<()>;

    async fn reset_password_for_email(&self, email: &str) -> Result<()>;

    /// User behind the current session, validated by the service
    async fn get_user(&self) -> Result<Option<User>>;

    /// Subscribe to session-change notifications
    fn on_auth_state_change(&self) -> AuthSubscription;
}

/// Everything the controllers need from the hosted service
pub trait Backend: AuthBackend + TaskRepository {}

impl<T: AuthBackend + TaskRepository + ?Sized> Backend for T {}

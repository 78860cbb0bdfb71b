//! Auth form controller
//!
//! Email/password entry with login and signup intents plus password reset.
//! Nothing here outlives the current input; the session itself arrives via
//! the session controller's subscription.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::Backend;

pub const SIGNUP_SUCCESS: &str = "Account created! Check your email to verify.";
pub const RESET_EMAIL_REQUIRED: &str = "Please enter your email first";
pub const RESET_EMAIL_SENT: &str = "Password reset email sent!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    SignUp,
}

/// Dismissible feedback shown over the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessage {
    pub text: String,
    pub is_error: bool,
}

impl FormMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

pub struct AuthForm {
    backend: Arc<dyn Backend>,
    mode: AuthMode,
    email: String,
    password: String,
    loading: bool,
    message: Option<FormMessage>,
}

impl AuthForm {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            mode: AuthMode::Login,
            email: String::new(),
            password: String::new(),
            loading: false,
            message: None,
        }
    }

    /// Back to an empty login form
    pub fn reset(&mut self) {
        self.mode = AuthMode::Login;
        self.email.clear();
        self.password.clear();
        self.loading = false;
        self.message = None;
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Switch between login and signup. Typed input is kept.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::Login,
        };
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    /// Sign in or sign up, depending on the current mode
    pub async fn submit(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.message = None;

        match self.mode {
            AuthMode::Login => {
                if let Err(e) = self
                    .backend
                    .sign_in_with_password(&self.email, &self.password)
                    .await
                {
                    warn!("Sign-in failed: {}", e);
                    self.message = Some(FormMessage::error(e.user_message()));
                }
            }
            AuthMode::SignUp => match self.backend.sign_up(&self.email, &self.password).await {
                Ok(session) => {
                    debug!("Sign-up accepted, session issued: {}", session.is_some());
                    self.message = Some(FormMessage::info(SIGNUP_SUCCESS));
                }
                Err(e) => {
                    warn!("Sign-up failed: {}", e);
                    self.message = Some(FormMessage::error(e.user_message()));
                }
            },
        }

        self.loading = false;
    }

    /// Request a password reset email for the entered address
    pub async fn reset_password(&mut self) {
        if self.loading {
            return;
        }
        // Whitespace-only addresses go to the service, which rejects them
        if self.email.is_empty() {
            self.message = Some(FormMessage::error(RESET_EMAIL_REQUIRED));
            return;
        }

        self.loading = true;
        self.message = None;

        match self.backend.reset_password_for_email(&self.email).await {
            Ok(()) => self.message = Some(FormMessage::info(RESET_EMAIL_SENT)),
            Err(e) => {
                warn!("Password reset failed: {}", e);
                self.message = Some(FormMessage::error(e.user_message()));
            }
        }

        self.loading = false;
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn message(&self) -> Option<&FormMessage> {
        self.message.as_ref()
    }

    pub fn submit_label(&self) -> &'static str {
        match self.mode {
            AuthMode::Login => "Login",
            AuthMode::SignUp => "Sign Up",
        }
    }

    pub fn toggle_label(&self) -> &'static str {
        match self.mode {
            AuthMode::Login => "Need an account? Sign up",
            AuthMode::SignUp => "Already have an account? Login",
        }
    }

    /// The reset link is only offered on the login form
    pub fn offers_password_reset(&self) -> bool {
        self.mode == AuthMode::Login
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthBackend, InMemoryBackend, Operation};

    fn form_with(backend: &Arc<InMemoryBackend>) -> AuthForm {
        AuthForm::new(backend.clone())
    }

    #[tokio::test]
    async fn test_login_success_sets_no_message() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("a@x.com", "secret1").await.unwrap();
        backend.sign_out().await.unwrap();

        let mut form = form_with(&backend);
        form.set_email("a@x.com");
        form.set_password("secret1");
        form.submit().await;

        assert!(form.message().is_none());
        assert!(!form.is_loading());
        assert!(backend.get_session().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_raw_message() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut form = form_with(&backend);
        form.set_email("a@x.com");
        form.set_password("nope");
        form.submit().await;

        assert_eq!(
            form.message(),
            Some(&FormMessage::error("Invalid login credentials"))
        );
    }

    #[tokio::test]
    async fn test_signup_shows_verification_message() {
        let backend = Arc::new(InMemoryBackend::new().with_email_confirmation(true));
        let mut form = form_with(&backend);
        form.toggle_mode();
        form.set_email("a@x.com");
        form.set_password("secret1");
        form.submit().await;

        assert_eq!(form.message(), Some(&FormMessage::info(SIGNUP_SUCCESS)));
        assert!(backend.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_duplicate_is_error() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("a@x.com", "secret1").await.unwrap();

        let mut form = form_with(&backend);
        form.toggle_mode();
        form.set_email("a@x.com");
        form.set_password("secret1");
        form.submit().await;

        let message = form.message().unwrap();
        assert!(message.is_error);
        assert_eq!(message.text, "User already registered");
    }

    #[tokio::test]
    async fn test_reset_password_requires_email() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut form = form_with(&backend);
        form.reset_password().await;

        assert_eq!(form.message(), Some(&FormMessage::error(RESET_EMAIL_REQUIRED)));
        assert!(backend.password_reset_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_password_sends_email() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut form = form_with(&backend);
        form.set_email("a@x.com");
        form.reset_password().await;

        assert_eq!(form.message(), Some(&FormMessage::info(RESET_EMAIL_SENT)));
        assert_eq!(backend.password_reset_requests().await, vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn test_reset_password_passes_whitespace_email_through() {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .fail_next(Operation::ResetPassword, "Unable to validate email address: invalid format")
            .await;
        let mut form = form_with(&backend);
        form.set_email("   ");
        form.reset_password().await;

        assert_eq!(
            form.message(),
            Some(&FormMessage::error("Unable to validate email address: invalid format"))
        );
    }

    #[tokio::test]
    async fn test_reset_password_failure() {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .fail_next(Operation::ResetPassword, "For security purposes, you can only request this once every 60 seconds")
            .await;
        let mut form = form_with(&backend);
        form.set_email("a@x.com");
        form.reset_password().await;

        let message = form.message().unwrap();
        assert!(message.is_error);
        assert!(message.text.starts_with("For security purposes"));
    }

    #[test]
    fn test_toggle_keeps_input_and_reset_clears_it() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut form = form_with(&backend);
        form.set_email("a@x.com");
        form.set_password("secret1");

        form.toggle_mode();
        assert_eq!(form.mode(), AuthMode::SignUp);
        assert_eq!(form.email(), "a@x.com");
        assert_eq!(form.password(), "secret1");
        assert_eq!(form.submit_label(), "Sign Up");
        assert!(!form.offers_password_reset());

        form.reset();
        assert_eq!(form.mode(), AuthMode::Login);
        assert!(form.email().is_empty());
        assert!(form.password().is_empty());
        assert!(form.message().is_none());
    }
}

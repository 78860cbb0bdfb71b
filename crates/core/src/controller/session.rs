//! Session controller
//!
//! Owns the current authentication state. The session is fetched once on
//! mount, then kept current by a listener task fed from the backend's
//! session-change subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::auth::Session;
use crate::backend::Backend;

pub struct SessionController {
    backend: Arc<dyn Backend>,
    session_tx: Arc<watch::Sender<Option<Session>>>,
    session_rx: watch::Receiver<Option<Session>>,
    /// Listener task holding the subscription; aborting it unsubscribes
    listener: Option<JoinHandle<()>>,
    /// Set once any notification arrived, so a slower initial fetch
    /// cannot overwrite it
    notified: Arc<AtomicBool>,
    loading: bool,
    logout_loading: bool,
}

impl SessionController {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (session_tx, session_rx) = watch::channel(None);
        Self {
            backend,
            session_tx: Arc::new(session_tx),
            session_rx,
            listener: None,
            notified: Arc::new(AtomicBool::new(false)),
            loading: true,
            logout_loading: false,
        }
    }

    /// Subscribe to session changes and fetch the current session.
    ///
    /// Mounting twice is a no-op.
    pub async fn mount(&mut self) {
        if self.listener.is_some() {
            return;
        }

        let mut subscription = self.backend.on_auth_state_change();
        let tx = Arc::clone(&self.session_tx);
        let notified = Arc::clone(&self.notified);
        self.listener = Some(tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                debug!("Session change received: {:?}", change.event);
                notified.store(true, Ordering::SeqCst);
                tx.send_replace(change.session);
            }
        }));

        self.fetch_session().await;
    }

    async fn fetch_session(&mut self) {
        self.loading = true;
        let session = match self.backend.get_session().await {
            Ok(session) => session,
            Err(e) => {
                error!("Error fetching session: {}", e);
                None
            }
        };
        if self.notified.load(Ordering::SeqCst) {
            debug!("Session changed while fetching, keeping the notified value");
        } else {
            self.session_tx.send_replace(session);
        }
        self.loading = false;
    }

    /// Sign out. Returns `true` when the backend accepted it.
    ///
    /// On failure the session is left as it was.
    pub async fn logout(&mut self) -> bool {
        self.logout_loading = true;
        let result = self.backend.sign_out().await;
        self.logout_loading = false;

        match result {
            Ok(()) => {
                info!("Logged out");
                self.session_tx.send_replace(None);
                true
            }
            Err(e) => {
                error!("Error logging out: {}", e);
                false
            }
        }
    }

    /// Release the subscription and wait for the listener to finish
    pub async fn teardown(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
            let _ = handle.await;
            debug!("Session listener stopped");
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session_rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_rx.borrow().is_some()
    }

    /// True until the initial fetch has completed
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_logout_loading(&self) -> bool {
        self.logout_loading
    }

    pub fn is_mounted(&self) -> bool {
        self.listener.is_some()
    }

    /// Wait until the session value changes.
    ///
    /// Returns `false` if the controller can no longer change.
    pub async fn changed(&mut self) -> bool {
        self.session_rx.changed().await.is_ok()
    }

    /// Independent receiver of the session value
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthBackend, InMemoryBackend, Operation};
    use std::time::Duration;

    async fn wait_for(controller: &SessionController, signed_in: bool) {
        let mut rx = controller.watch();
        tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|s| s.is_some() == signed_in))
            .await
            .expect("session state never arrived")
            .unwrap();
    }

    #[tokio::test]
    async fn test_mount_fetches_existing_session() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("a@x.com", "secret1").await.unwrap();

        let mut controller = SessionController::new(backend.clone());
        assert!(controller.is_loading());

        controller.mount().await;
        assert!(!controller.is_loading());
        assert!(controller.is_authenticated());
        assert_eq!(
            controller.session().unwrap().user.email.as_deref(),
            Some("a@x.com")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_treated_as_signed_out() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("a@x.com", "secret1").await.unwrap();
        backend.fail_next(Operation::GetSession, "network down").await;

        let mut controller = SessionController::new(backend);
        controller.mount().await;

        assert!(!controller.is_loading());
        assert!(!controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_notifications_replace_session() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut controller = SessionController::new(backend.clone());
        controller.mount().await;
        assert!(!controller.is_authenticated());

        backend.sign_up("a@x.com", "secret1").await.unwrap();
        wait_for(&controller, true).await;

        backend.sign_out().await.unwrap();
        wait_for(&controller, false).await;
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("a@x.com", "secret1").await.unwrap();
        let mut controller = SessionController::new(backend);
        controller.mount().await;

        assert!(controller.logout().await);
        assert!(!controller.is_authenticated());
        assert!(!controller.is_logout_loading());
    }

    #[tokio::test]
    async fn test_failed_logout_keeps_session() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("a@x.com", "secret1").await.unwrap();
        let mut controller = SessionController::new(backend.clone());
        controller.mount().await;

        backend.fail_next(Operation::SignOut, "offline").await;
        assert!(!controller.logout().await);
        assert!(controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_teardown_releases_subscription() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut controller = SessionController::new(backend.clone());

        controller.mount().await;
        controller.mount().await;
        assert_eq!(backend.subscriber_count(), 1);

        controller.teardown().await;
        assert!(!controller.is_mounted());
        assert_eq!(backend.subscriber_count(), 0);
    }
}

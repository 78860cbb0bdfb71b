//! Session-change pub/sub hub

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::model::{AuthChangeEvent, AuthStateChange, Session};

const DEFAULT_CAPACITY: usize = 32;

/// Fan-out of session-change notifications to every live subscription
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthStateChange>,
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    /// Notify all subscribers. Having no subscribers is not an error.
    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        debug!("Auth state change: {:?}", event);
        let _ = self.tx.send(AuthStateChange { event, session });
    }

    /// Register a new subscription
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live registration on [`AuthEvents`].
///
/// Released by [`AuthSubscription::unsubscribe`] or on drop.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthStateChange>,
}

impl AuthSubscription {
    /// Wait for the next notification; `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<AuthStateChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Auth subscription lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Release the subscription
    pub fn unsubscribe(self) {
        drop(self);
    }
}

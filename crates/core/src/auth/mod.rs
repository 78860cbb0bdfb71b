//! Auth module
//!
//! Session and user types, the session-change hub, and on-disk session
//! persistence.

mod events;
mod model;
mod session_store;

pub use events::{AuthEvents, AuthSubscription};
pub use model::*;
pub use session_store::FileSessionStore;

//! Error types for the core library

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The auth service rejected the request; `message` is its verbatim text
    #[error("Auth error: {message}")]
    Auth { status: Option<u16>, message: String },

    /// The row-store rejected the request
    #[error("Data API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("No active session")]
    NotAuthenticated,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an Auth error without an HTTP status
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            status: None,
            message: message.into(),
        }
    }

    /// Text shown to the user when an auth action fails.
    ///
    /// Backend rejections are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth { message, .. } | Self::Api { message, .. } => message.clone(),
            Self::NotAuthenticated => "Auth session missing!".to_string(),
            other => other.to_string(),
        }
    }

    /// HTTP status reported by the backend, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } => *status,
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

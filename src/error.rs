//! Error types for mailslot
//!
//! Defines the crate-level error enum covering configuration, I/O and mailbox
//! failures. Uses thiserror for ergonomic error handling.

use crate::mailbox::MailboxError;
use thiserror::Error;

/// Result type alias for mailslot operations
pub type Result<T> = std::result::Result<T, MailslotError>;

/// Crate-level error type
#[derive(Error, Debug)]
pub enum MailslotError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Mailbox operation errors
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl MailslotError {
    /// The mailbox error underneath, if any
    pub fn as_mailbox(&self) -> Option<&MailboxError> {
        match self {
            MailslotError::Mailbox(e) => Some(e),
            _ => None,
        }
    }
}

//! Mailbox error taxonomy
//!
//! Every failure here is an expected, recoverable condition reported to the caller.
//! Nothing is retried automatically.

use mailslot_core::BufferError;
use thiserror::Error;

/// Errors returned by registry and device operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("no mailbox with id {0}")]
    NoSuchInstance(usize),

    #[error("all {0} mailboxes are already open")]
    CapacityExceeded(usize),

    #[error("mailbox {0} is already open")]
    AlreadyOpen(usize),

    #[error("mailbox {0} is not open")]
    NotOpen(usize),

    #[error("no mailboxes are open")]
    NothingToClose,

    #[error("mailbox {id} is full ({capacity} messages queued)")]
    Full { id: usize, capacity: usize },

    #[error("mailbox {0} is empty")]
    Empty(usize),

    #[error("message of {len} bytes exceeds the {limit} byte limit of mailbox {id}")]
    Oversized { id: usize, len: usize, limit: usize },

    #[error("mailbox {0} is busy")]
    Busy(usize),
}

/// Result type for mailbox operations
pub type Result<T> = std::result::Result<T, MailboxError>;

impl MailboxError {
    /// Attach the mailbox id to a buffer error
    pub fn from_buffer(id: usize, err: BufferError) -> Self {
        match err {
            BufferError::Full { capacity } => MailboxError::Full { id, capacity },
            BufferError::Empty => MailboxError::Empty(id),
            BufferError::Oversized { len, limit } => MailboxError::Oversized { id, len, limit },
        }
    }

    /// Short stable label, used for metrics and shell output
    pub fn reason(&self) -> &'static str {
        match self {
            MailboxError::NoSuchInstance(_) => "no_such_instance",
            MailboxError::CapacityExceeded(_) => "capacity_exceeded",
            MailboxError::AlreadyOpen(_) => "already_open",
            MailboxError::NotOpen(_) => "not_open",
            MailboxError::NothingToClose => "nothing_to_close",
            MailboxError::Full { .. } => "full",
            MailboxError::Empty(_) => "empty",
            MailboxError::Oversized { .. } => "oversized",
            MailboxError::Busy(_) => "busy",
        }
    }

    /// True if the same call may succeed once the lock holder moves on
    pub fn is_busy(&self) -> bool {
        matches!(self, MailboxError::Busy(_))
    }
}

//! Mailslot - numbered in-process mailboxes behind a file-like interface
//!
//! Callers open a numbered mailbox, write byte messages into it and read them back
//! one at a time, each read removing the message it returns. Every mailbox has its
//! own bounded buffer, its own open/close exclusivity and its own lock.
//!
//! # Architecture
//!
//! - **mailbox**: Registry, instances, interruptible per-mailbox locking
//! - **device**: File-like open/read/write/close boundary with read cursors
//! - **config**: YAML configuration and validation
//! - **shell**: Interactive command loop over a device
//! - **stress**: Concurrent writer verification run
//! - **metrics**: Prometheus counters for mailbox traffic
//!
//! Message storage itself lives in the `mailslot-core` crate.

// Core modules
pub mod config;
pub mod error;
pub mod mailbox;

// Components
pub mod device;
pub mod logging;
pub mod metrics;
pub mod shell;
pub mod stress;

// Re-exports
pub use device::{DeviceEndpoint, ReadData, ReadOutcome};
pub use error::{MailslotError, Result};
pub use mailbox::{Interrupt, InterruptHandle, MailboxError, MailboxRegistry};

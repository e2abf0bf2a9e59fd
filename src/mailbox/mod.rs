//! Mailbox storage and concurrency engine
//!
//! Numbered mailboxes, each with a bounded message buffer, an open flag and its
//! own lock.
//!
//! # Overview
//!
//! - **MailboxRegistry** owns every instance and the count of open ones
//! - **MailboxInstance** pairs a buffer with its open flag and lock
//! - **Interrupt** lets a caller abandon a lock wait, which surfaces as `Busy`
//!
//! # Concurrency
//!
//! Operations on the same mailbox are serialized by its lock, with no interleaved
//! partial pushes or pops. Operations on different mailboxes never contend.
//! Open and close only touch bookkeeping and never wait for a buffer lock.

mod error;
mod instance;
mod interrupt;
mod registry;

pub use error::{MailboxError, Result};
pub use instance::MailboxInstance;
pub use interrupt::{Interrupt, InterruptHandle};
pub use registry::{MailboxRegistry, MailboxStats};

pub use mailslot_core::{
    BufferConfig, BufferError, DeliveryOrder, MailboxBuffer, Message, OversizePolicy, INSTANCES,
    MAILSLOT_STORAGE, MESSAGE_SIZE,
};

//! Bounded message buffers for the mailslot service
//!
//! This crate holds the storage half of a mailbox: the byte [`Message`], the
//! fixed-capacity [`MailboxBuffer`] and the policies that decide how the buffer
//! orders deliveries and what happens to payloads that exceed the size limit.
//!
//! Nothing in here is synchronized. A `MailboxBuffer` is meant to live behind the
//! lock of the mailbox instance that owns it; every mutating call assumes the caller
//! already holds that lock.
//!
//! # Example
//!
//! ```
//! use mailslot_core::{BufferConfig, DeliveryOrder, MailboxBuffer};
//!
//! let mut buffer = MailboxBuffer::new(BufferConfig::default().with_order(DeliveryOrder::Fifo));
//!
//! buffer.push(b"first")?;
//! buffer.push(b"second")?;
//!
//! assert_eq!(buffer.pop()?.as_bytes(), b"first");
//! assert_eq!(buffer.len(), 1);
//! # Ok::<(), mailslot_core::BufferError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::VecDeque;
use thiserror::Error;

/// Default number of mailbox instances in a registry
pub const INSTANCES: usize = 256;

/// Default maximum payload size of a single message, in bytes
pub const MESSAGE_SIZE: usize = 256;

/// Default maximum number of queued messages per mailbox
pub const MAILSLOT_STORAGE: usize = 256;

/// Errors raised by buffer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("mailbox is full ({capacity} messages queued)")]
    Full { capacity: usize },

    #[error("mailbox is empty")]
    Empty,

    #[error("message of {len} bytes exceeds the {limit} byte limit")]
    Oversized { len: usize, limit: usize },
}

/// Result type for buffer operations
pub type Result<T> = std::result::Result<T, BufferError>;

/// Order in which queued messages are handed back by [`MailboxBuffer::pop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOrder {
    /// Oldest message first
    #[default]
    Fifo,

    /// Most recently pushed message first
    Lifo,
}

impl std::fmt::Display for DeliveryOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOrder::Fifo => write!(f, "fifo"),
            DeliveryOrder::Lifo => write!(f, "lifo"),
        }
    }
}

/// What to do with a payload longer than the configured message size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Keep the leading `message_size` bytes and drop the rest
    #[default]
    Truncate,

    /// Refuse the whole message
    Reject,
}

impl std::fmt::Display for OversizePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OversizePolicy::Truncate => write!(f, "truncate"),
            OversizePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Limits and policies of a single mailbox buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum payload size of one message, in bytes
    #[serde(default = "default_message_size")]
    pub message_size: usize,

    /// Maximum number of queued, unread messages
    #[serde(default = "default_storage")]
    pub storage: usize,

    /// Delivery order of `pop`
    #[serde(default)]
    pub order: DeliveryOrder,

    /// Handling of payloads longer than `message_size`
    #[serde(default)]
    pub oversize: OversizePolicy,
}

fn default_message_size() -> usize {
    MESSAGE_SIZE
}

fn default_storage() -> usize {
    MAILSLOT_STORAGE
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            message_size: default_message_size(),
            storage: default_storage(),
            order: DeliveryOrder::default(),
            oversize: OversizePolicy::default(),
        }
    }
}

impl BufferConfig {
    /// Set the delivery order
    pub fn with_order(mut self, order: DeliveryOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the oversize policy
    pub fn with_oversize(mut self, oversize: OversizePolicy) -> Self {
        self.oversize = oversize;
        self
    }

    /// Set the maximum message size
    pub fn with_message_size(mut self, message_size: usize) -> Self {
        self.message_size = message_size;
        self
    }

    /// Set the number of message slots
    pub fn with_storage(mut self, storage: usize) -> Self {
        self.storage = storage;
        self
    }
}

/// A byte payload stored in a mailbox
///
/// The length is authoritative: content is never treated as a terminated string,
/// so interior and trailing NUL bytes survive a round trip.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Message {
    content: Box<[u8]>,
}

impl Message {
    /// Create a message by taking ownership of `content`
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into().into_boxed_slice(),
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// True for a zero-length payload
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Borrow the payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("len", &self.len())
            .field("content", &self.to_string_lossy())
            .finish()
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.content
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

/// Bounded ordered container of messages belonging to one mailbox
///
/// Holds at most `config.storage` messages of at most `config.message_size` bytes
/// each. Every operation is all-or-nothing: a failed push or pop leaves the queued
/// messages exactly as they were.
#[derive(Debug, Clone)]
pub struct MailboxBuffer {
    slots: VecDeque<Message>,
    config: BufferConfig,
}

impl MailboxBuffer {
    /// Create an empty buffer
    pub fn new(config: BufferConfig) -> Self {
        Self {
            slots: VecDeque::new(),
            config,
        }
    }

    /// Create an empty buffer with the default limits (256 x 256 bytes, FIFO)
    pub fn with_defaults() -> Self {
        Self::new(BufferConfig::default())
    }

    /// Copy `bytes` into the next free slot
    ///
    /// Returns the number of bytes stored, which is smaller than `bytes.len()` only
    /// when the payload was truncated to the message size limit.
    ///
    /// # Errors
    /// - [`BufferError::Full`] when all slots are taken
    /// - [`BufferError::Oversized`] when the payload is too long and the policy is
    ///   [`OversizePolicy::Reject`]
    pub fn push(&mut self, bytes: &[u8]) -> Result<usize> {
        if self.is_full() {
            return Err(BufferError::Full {
                capacity: self.config.storage,
            });
        }

        let limit = self.config.message_size;
        let accepted = if bytes.len() > limit {
            match self.config.oversize {
                OversizePolicy::Truncate => limit,
                OversizePolicy::Reject => {
                    return Err(BufferError::Oversized {
                        len: bytes.len(),
                        limit,
                    })
                }
            }
        } else {
            bytes.len()
        };

        self.slots.push_back(Message::new(&bytes[..accepted]));
        Ok(accepted)
    }

    /// Remove and return the next message according to the delivery order
    ///
    /// # Errors
    /// [`BufferError::Empty`] when nothing is queued
    pub fn pop(&mut self) -> Result<Message> {
        let next = match self.config.order {
            DeliveryOrder::Fifo => self.slots.pop_front(),
            DeliveryOrder::Lifo => self.slots.pop_back(),
        };
        next.ok_or(BufferError::Empty)
    }

    /// Drop every queued message, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.slots.len();
        self.slots.clear();
        discarded
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when another push would fail with `Full`
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.config.storage
    }

    /// Maximum number of queued messages
    pub fn capacity(&self) -> usize {
        self.config.storage
    }

    /// Limits and policies of this buffer
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

impl Default for MailboxBuffer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

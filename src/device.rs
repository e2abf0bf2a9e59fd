//! File-like device endpoint
//!
//! Maps open/read/write/close calls addressed by a minor number onto the mailbox
//! with the same id.
//!
//! # Reads
//!
//! A read cycle starts with cursor 0. The first read pops one message and moves
//! the cursor past it; any further read in the same cycle returns
//! [`ReadData::EndOfCycle`] with zero bytes, so a caller that keeps reading until
//! it sees nothing consumes exactly one message. An empty mailbox yields
//! [`ReadData::NoData`] rather than an error and leaves the cursor at 0.
//!
//! # Example
//!
//! ```no_run
//! use mailslot::device::{DeviceEndpoint, ReadData};
//! use mailslot::mailbox::Interrupt;
//!
//! # async fn demo() -> mailslot::mailbox::Result<()> {
//! let device = DeviceEndpoint::with_defaults();
//! let interrupt = Interrupt::never();
//!
//! device.open(0)?;
//! device.write(0, b"ping", &interrupt).await?;
//!
//! let outcome = device.read(0, 0, &interrupt).await?;
//! assert!(matches!(outcome.data, ReadData::Message(_)));
//!
//! let again = device.read(0, outcome.cursor, &interrupt).await?;
//! assert_eq!(again.data, ReadData::EndOfCycle);
//!
//! device.close(0, &interrupt).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::MailslotConfig;
use crate::mailbox::{Interrupt, MailboxError, MailboxRegistry, Message, Result};
use std::sync::Arc;

/// Name the device registers under
pub const DEVICE_NAME: &str = "mailslot";

/// What a read delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadData {
    /// A message was removed from the mailbox
    Message(Message),

    /// The mailbox was empty
    NoData,

    /// This read cycle already delivered its message
    EndOfCycle,
}

/// Result of a read call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub data: ReadData,
    /// Cursor to pass to the next read of the same cycle
    pub cursor: u64,
}

impl ReadOutcome {
    /// Payload bytes delivered by this read (empty unless a message was popped)
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            ReadData::Message(msg) => msg.as_bytes(),
            ReadData::NoData | ReadData::EndOfCycle => &[],
        }
    }
}

/// Boundary between external callers and the mailbox registry
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    registry: Arc<MailboxRegistry>,
    clear_on_close: bool,
}

impl DeviceEndpoint {
    /// Serve `registry`, keeping messages across close
    pub fn new(registry: Arc<MailboxRegistry>) -> Self {
        Self {
            registry,
            clear_on_close: false,
        }
    }

    /// Serve a fresh default registry
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(MailboxRegistry::with_defaults()))
    }

    /// Build the registry and endpoint described by `config`
    ///
    /// # Errors
    /// [`crate::MailslotError::Config`] when `config` fails validation
    pub fn from_config(config: &MailslotConfig) -> crate::Result<Self> {
        let registry = MailboxRegistry::from_config(config)?;
        Ok(Self::new(Arc::new(registry)).with_clear_on_close(config.clear_on_close))
    }

    /// Drop queued messages when a mailbox is closed
    pub fn with_clear_on_close(mut self, clear_on_close: bool) -> Self {
        self.clear_on_close = clear_on_close;
        self
    }

    /// The registry behind this endpoint
    pub fn registry(&self) -> &Arc<MailboxRegistry> {
        &self.registry
    }

    /// Mailbox id for `minor`, rejecting minors past the last mailbox
    pub fn resolve(&self, minor: u32) -> Result<usize> {
        let id = minor as usize;
        if id >= self.registry.capacity() {
            tracing::warn!(minor, device = DEVICE_NAME, "No mailbox for minor number");
            return Err(MailboxError::NoSuchInstance(id));
        }
        Ok(id)
    }

    /// Open the mailbox behind `minor`
    ///
    /// # Errors
    /// `CapacityExceeded` or `AlreadyOpen`
    pub fn open(&self, minor: u32) -> Result<()> {
        let id = self.resolve(minor)?;
        self.registry.open(id)
    }

    /// Close the mailbox behind `minor`, clearing it first if configured to
    ///
    /// # Errors
    /// `NothingToClose` or `NotOpen`; `Busy` if clearing could not get the lock,
    /// in which case the mailbox stays open
    pub async fn close(&self, minor: u32, interrupt: &Interrupt) -> Result<()> {
        let id = self.resolve(minor)?;

        if self.clear_on_close && self.registry.is_open(id)? {
            self.registry.clear(id, interrupt).await?;
        }

        self.registry.close(id)
    }

    /// Read one message from the mailbox behind `minor`
    ///
    /// See the module docs for the cursor protocol.
    pub async fn read(&self, minor: u32, cursor: u64, interrupt: &Interrupt) -> Result<ReadOutcome> {
        let id = self.resolve(minor)?;

        if cursor > 0 {
            tracing::trace!(mailbox = id, cursor, "Read cycle already delivered");
            return Ok(ReadOutcome {
                data: ReadData::EndOfCycle,
                cursor,
            });
        }

        match self.registry.pop(id, interrupt).await {
            Ok(msg) => {
                // Past the payload and the newline a text reader appends to it
                let cursor = cursor + msg.len() as u64 + 1;
                Ok(ReadOutcome {
                    data: ReadData::Message(msg),
                    cursor,
                })
            }
            Err(MailboxError::Empty(_)) => Ok(ReadOutcome {
                data: ReadData::NoData,
                cursor,
            }),
            Err(e) => Err(e),
        }
    }

    /// Write `bytes` as one message to the mailbox behind `minor`
    ///
    /// Returns the number of bytes accepted.
    ///
    /// # Errors
    /// `Busy`, `Full`, or `Oversized` when oversize payloads are rejected
    pub async fn write(&self, minor: u32, bytes: &[u8], interrupt: &Interrupt) -> Result<usize> {
        let id = self.resolve(minor)?;
        self.registry.push(id, bytes, interrupt).await
    }
}

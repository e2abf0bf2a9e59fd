//! A single numbered mailbox
//!
//! Wraps a [`MailboxBuffer`] with its open flag and its lock. The lock is per
//! instance, so traffic on one mailbox never waits on another.

use super::{Interrupt, MailboxError, Result};
use crate::metrics;
use mailslot_core::{BufferConfig, MailboxBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};

/// One mailbox: buffer, open flag and exclusive-access lock
#[derive(Debug)]
pub struct MailboxInstance {
    id: usize,
    /// Written only while the registry's open/close bookkeeping lock is held
    opened: AtomicBool,
    buffer: Mutex<MailboxBuffer>,
}

impl MailboxInstance {
    /// Create a closed, empty mailbox
    pub fn new(id: usize, config: BufferConfig) -> Self {
        Self {
            id,
            opened: AtomicBool::new(false),
            buffer: Mutex::new(MailboxBuffer::new(config)),
        }
    }

    /// Mailbox id
    pub fn id(&self) -> usize {
        self.id
    }

    /// True while a caller holds this mailbox open
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    pub(crate) fn set_open(&self, open: bool) {
        self.opened.store(open, Ordering::Release);
    }

    /// Acquire the buffer lock, giving up with `Busy` if interrupted
    ///
    /// An uncontended lock is taken immediately even when `interrupt` has already
    /// fired. Otherwise the wait ends with [`MailboxError::Busy`] as soon as the
    /// interrupt fires or `timeout` elapses, whichever comes first. A failed
    /// acquisition never touches the buffer.
    ///
    /// The guard releases the lock when dropped, on every exit path.
    pub async fn lock(
        &self,
        interrupt: &Interrupt,
        timeout: Option<Duration>,
    ) -> Result<MutexGuard<'_, MailboxBuffer>> {
        let started = Instant::now();

        let acquire = async {
            tokio::select! {
                biased;
                guard = self.buffer.lock() => Some(guard),
                _ = interrupt.triggered() => None,
            }
        };

        let guard = match timeout {
            Some(limit) => tokio::time::timeout(limit, acquire).await.ok().flatten(),
            None => acquire.await,
        };

        metrics::observe_lock_wait(started.elapsed().as_secs_f64());

        match guard {
            Some(guard) => Ok(guard),
            None => {
                tracing::debug!(mailbox = self.id, "Mailbox lock acquisition interrupted");
                metrics::record_rejection("busy");
                Err(MailboxError::Busy(self.id))
            }
        }
    }

    /// Acquire the buffer lock only if nobody holds it
    pub fn try_lock(&self) -> Result<MutexGuard<'_, MailboxBuffer>> {
        self.buffer.try_lock().map_err(|_| {
            metrics::record_rejection("busy");
            MailboxError::Busy(self.id)
        })
    }
}

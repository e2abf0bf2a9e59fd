//! Mailbox registry
//!
//! The fixed table of all mailbox instances plus the count of open ones.
//!
//! # Locking
//!
//! - The instance table is built once and never resized, so looking up an id
//!   takes no lock.
//! - Open/close bookkeeping (each instance's open flag and the global open count)
//!   is guarded by one short-lived lock that is never held across an await.
//! - Buffer contents are guarded by the owning instance's lock, acquired
//!   interruptibly for every push, pop and clear.
//!
//! # Example
//!
//! ```no_run
//! use mailslot::mailbox::{Interrupt, MailboxRegistry};
//!
//! # async fn demo() -> mailslot::mailbox::Result<()> {
//! let registry = MailboxRegistry::with_defaults();
//! let interrupt = Interrupt::never();
//!
//! registry.open(3)?;
//! registry.push(3, b"hello", &interrupt).await?;
//! let msg = registry.pop(3, &interrupt).await?;
//! assert_eq!(msg.as_bytes(), b"hello");
//! registry.close(3)?;
//! # Ok(())
//! # }
//! ```

use super::{Interrupt, MailboxError, MailboxInstance, Result};
use crate::config::{validate_config_result, MailslotConfig};
use crate::metrics;
use mailslot_core::{BufferConfig, Message, INSTANCES};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Point-in-time view of one mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxStats {
    /// Mailbox id
    pub id: usize,
    /// Whether a caller holds it open
    pub opened: bool,
    /// Queued, unread messages
    pub queued: usize,
    /// Maximum number of queued messages
    pub capacity: usize,
}

/// Table of all mailbox instances
#[derive(Debug)]
pub struct MailboxRegistry {
    instances: Box<[MailboxInstance]>,
    /// Number of instances whose open flag is set
    open_count: Mutex<usize>,
    lock_timeout: Option<Duration>,
}

impl MailboxRegistry {
    /// Create `instances` closed, empty mailboxes sharing one buffer configuration
    pub fn new(instances: usize, buffer: BufferConfig) -> Self {
        let instances = (0..instances)
            .map(|id| MailboxInstance::new(id, buffer.clone()))
            .collect();

        Self {
            instances,
            open_count: Mutex::new(0),
            lock_timeout: None,
        }
    }

    /// Create a registry with the default 256 mailboxes of 256 x 256 bytes
    pub fn with_defaults() -> Self {
        Self::new(INSTANCES, BufferConfig::default())
    }

    /// Create a registry from loaded configuration
    ///
    /// # Errors
    /// [`crate::MailslotError::Config`] when `config` fails validation
    pub fn from_config(config: &MailslotConfig) -> crate::Result<Self> {
        validate_config_result(config)?;

        tracing::debug!(
            instances = config.instances,
            message_size = config.buffer.message_size,
            storage = config.buffer.storage,
            order = %config.buffer.order,
            "Allocating mailbox registry"
        );

        Ok(Self::new(config.instances, config.buffer.clone())
            .with_lock_timeout(config.lock_timeout()))
    }

    /// Bound every lock wait by `timeout`
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Number of mailboxes
    pub fn capacity(&self) -> usize {
        self.instances.len()
    }

    /// Number of currently open mailboxes
    pub fn open_count(&self) -> usize {
        *self.bookkeeping()
    }

    /// Look up a mailbox by id
    pub fn instance(&self, id: usize) -> Result<&MailboxInstance> {
        self.instances
            .get(id)
            .ok_or(MailboxError::NoSuchInstance(id))
    }

    /// All mailboxes in id order
    pub fn instances(&self) -> impl Iterator<Item = &MailboxInstance> {
        self.instances.iter()
    }

    /// Whether mailbox `id` is open
    pub fn is_open(&self, id: usize) -> Result<bool> {
        Ok(self.instance(id)?.is_open())
    }

    fn bookkeeping(&self) -> MutexGuard<'_, usize> {
        // The guarded state is updated with plain stores, so a panic elsewhere
        // cannot leave it half-written.
        self.open_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark mailbox `id` as open
    ///
    /// Queued messages are left as they are.
    ///
    /// # Errors
    /// - [`MailboxError::CapacityExceeded`] when every mailbox is already open
    /// - [`MailboxError::AlreadyOpen`] when `id` is already open
    pub fn open(&self, id: usize) -> Result<()> {
        let instance = self.instance(id)?;
        let mut open_count = self.bookkeeping();

        if *open_count == self.instances.len() {
            tracing::warn!(mailbox = id, "No more room to open a mailbox");
            metrics::record_rejection("capacity_exceeded");
            return Err(MailboxError::CapacityExceeded(self.instances.len()));
        }

        if instance.is_open() {
            tracing::warn!(mailbox = id, "Mailbox is already open");
            metrics::record_rejection("already_open");
            return Err(MailboxError::AlreadyOpen(id));
        }

        instance.set_open(true);
        *open_count += 1;
        metrics::mailbox_opened();

        tracing::info!(mailbox = id, open = *open_count, "Mailbox opened");
        Ok(())
    }

    /// Mark mailbox `id` as closed
    ///
    /// Queued messages survive and are visible to the next opener.
    ///
    /// # Errors
    /// - [`MailboxError::NothingToClose`] when no mailbox is open
    /// - [`MailboxError::NotOpen`] when `id` is not open
    pub fn close(&self, id: usize) -> Result<()> {
        let instance = self.instance(id)?;
        let mut open_count = self.bookkeeping();

        if *open_count == 0 {
            tracing::warn!(mailbox = id, "No mailboxes to close");
            metrics::record_rejection("nothing_to_close");
            return Err(MailboxError::NothingToClose);
        }

        if !instance.is_open() {
            tracing::warn!(mailbox = id, "Mailbox is already closed");
            metrics::record_rejection("not_open");
            return Err(MailboxError::NotOpen(id));
        }

        instance.set_open(false);
        *open_count -= 1;
        metrics::mailbox_closed();

        tracing::info!(mailbox = id, open = *open_count, "Mailbox closed");
        Ok(())
    }

    /// Append a message to mailbox `id`
    ///
    /// Returns the number of bytes stored; smaller than `bytes.len()` only when the
    /// payload was truncated to the message size limit.
    ///
    /// # Errors
    /// - [`MailboxError::Busy`] when the lock wait was interrupted
    /// - [`MailboxError::Full`] when the mailbox has no free slot
    /// - [`MailboxError::Oversized`] when the payload is too long and oversize
    ///   payloads are rejected
    pub async fn push(&self, id: usize, bytes: &[u8], interrupt: &Interrupt) -> Result<usize> {
        let instance = self.instance(id)?;
        let mut buffer = instance.lock(interrupt, self.lock_timeout).await?;

        match buffer.push(bytes) {
            Ok(accepted) => {
                let truncated = accepted < bytes.len();
                metrics::record_push(truncated);
                tracing::debug!(
                    mailbox = id,
                    len = accepted,
                    truncated,
                    queued = buffer.len(),
                    "Message pushed"
                );
                Ok(accepted)
            }
            Err(e) => {
                let err = MailboxError::from_buffer(id, e);
                tracing::warn!(mailbox = id, len = bytes.len(), error = %err, "Message discarded");
                metrics::record_rejection(err.reason());
                Err(err)
            }
        }
    }

    /// Remove and return the next message of mailbox `id`
    ///
    /// # Errors
    /// - [`MailboxError::Busy`] when the lock wait was interrupted
    /// - [`MailboxError::Empty`] when nothing is queued
    pub async fn pop(&self, id: usize, interrupt: &Interrupt) -> Result<Message> {
        let instance = self.instance(id)?;
        let mut buffer = instance.lock(interrupt, self.lock_timeout).await?;

        match buffer.pop() {
            Ok(msg) => {
                metrics::record_pop();
                tracing::debug!(
                    mailbox = id,
                    len = msg.len(),
                    queued = buffer.len(),
                    "Message popped"
                );
                Ok(msg)
            }
            Err(e) => {
                tracing::debug!(mailbox = id, "No message to read");
                Err(MailboxError::from_buffer(id, e))
            }
        }
    }

    /// Drop every queued message of mailbox `id`, returning how many were discarded
    pub async fn clear(&self, id: usize, interrupt: &Interrupt) -> Result<usize> {
        let instance = self.instance(id)?;
        let mut buffer = instance.lock(interrupt, self.lock_timeout).await?;

        let discarded = buffer.clear();
        tracing::info!(mailbox = id, discarded, "Mailbox cleared");
        Ok(discarded)
    }

    /// Snapshot of mailbox `id`
    pub async fn stats(&self, id: usize, interrupt: &Interrupt) -> Result<MailboxStats> {
        let instance = self.instance(id)?;
        let buffer = instance.lock(interrupt, self.lock_timeout).await?;

        Ok(MailboxStats {
            id,
            opened: instance.is_open(),
            queued: buffer.len(),
            capacity: buffer.capacity(),
        })
    }
}

impl Default for MailboxRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailslot_core::{DeliveryOrder, OversizePolicy, MAILSLOT_STORAGE, MESSAGE_SIZE};
    use std::sync::Arc;

    fn small_registry() -> MailboxRegistry {
        MailboxRegistry::new(4, BufferConfig::default().with_storage(3))
    }

    fn opened_count(registry: &MailboxRegistry) -> usize {
        registry.instances().filter(|i| i.is_open()).count()
    }

    #[test]
    fn test_defaults() {
        let registry = MailboxRegistry::with_defaults();
        assert_eq!(registry.capacity(), INSTANCES);
        assert_eq!(registry.open_count(), 0);
        assert_eq!(opened_count(&registry), 0);
    }

    #[test]
    fn test_open_and_close() {
        let registry = small_registry();

        registry.open(2).unwrap();
        assert!(registry.is_open(2).unwrap());
        assert_eq!(registry.open_count(), 1);

        registry.close(2).unwrap();
        assert!(!registry.is_open(2).unwrap());
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_open_twice_fails() {
        let registry = small_registry();
        registry.open(1).unwrap();

        assert_eq!(registry.open(1), Err(MailboxError::AlreadyOpen(1)));
        assert_eq!(registry.open_count(), 1);
    }

    #[test]
    fn test_close_with_nothing_open() {
        let registry = small_registry();
        assert_eq!(registry.close(0), Err(MailboxError::NothingToClose));
    }

    #[test]
    fn test_close_never_opened() {
        let registry = small_registry();
        registry.open(0).unwrap();

        assert_eq!(registry.close(3), Err(MailboxError::NotOpen(3)));
        assert_eq!(registry.open_count(), 1);
    }

    #[test]
    fn test_capacity_exceeded() {
        let registry = MailboxRegistry::new(2, BufferConfig::default());
        registry.open(0).unwrap();
        registry.open(1).unwrap();

        assert_eq!(registry.open(1), Err(MailboxError::CapacityExceeded(2)));
        assert_eq!(registry.open_count(), 2);
    }

    #[test]
    fn test_from_config_applies_limits() {
        let mut config = MailslotConfig::new();
        config.instances = 3;
        config.buffer.storage = 2;
        config.lock_timeout_ms = Some(50);

        let registry = MailboxRegistry::from_config(&config).unwrap();
        assert_eq!(registry.capacity(), 3);
        assert_eq!(registry.instance(0).unwrap().try_lock().unwrap().capacity(), 2);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = MailslotConfig::new();
        config.buffer.storage = 0;

        let err = MailboxRegistry::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("storage"));
    }

    #[test]
    fn test_out_of_range_id() {
        let registry = small_registry();
        assert_eq!(registry.open(4), Err(MailboxError::NoSuchInstance(4)));
        assert_eq!(registry.close(99), Err(MailboxError::NoSuchInstance(99)));
        assert!(registry.instance(4).is_err());
    }

    #[test]
    fn test_open_count_tracks_flags() {
        let registry = MailboxRegistry::new(8, BufferConfig::default());
        let script: &[(bool, usize)] = &[
            (true, 0),
            (true, 5),
            (true, 5),
            (false, 3),
            (true, 7),
            (false, 0),
            (false, 0),
            (true, 0),
            (false, 5),
        ];

        for &(open, id) in script {
            let _ = if open {
                registry.open(id)
            } else {
                registry.close(id)
            };
            assert_eq!(registry.open_count(), opened_count(&registry));
        }
        assert_eq!(registry.open_count(), 2);
    }

    #[tokio::test]
    async fn test_push_pop_round_trip() {
        let registry = small_registry();
        let interrupt = Interrupt::never();

        assert_eq!(registry.push(0, b"payload", &interrupt).await.unwrap(), 7);
        let msg = registry.pop(0, &interrupt).await.unwrap();
        assert_eq!(msg.as_bytes(), b"payload");

        let stats = registry.stats(0, &interrupt).await.unwrap();
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_messages_survive_close_and_reopen() {
        let registry = small_registry();
        let interrupt = Interrupt::never();

        registry.open(1).unwrap();
        registry.push(1, b"persisted", &interrupt).await.unwrap();
        registry.close(1).unwrap();
        registry.open(1).unwrap();

        assert_eq!(
            registry.pop(1, &interrupt).await.unwrap().as_bytes(),
            b"persisted"
        );
    }

    #[tokio::test]
    async fn test_open_twice_leaves_buffer_untouched() {
        let registry = small_registry();
        let interrupt = Interrupt::never();

        registry.open(2).unwrap();
        registry.push(2, b"a", &interrupt).await.unwrap();
        assert!(registry.open(2).is_err());

        let stats = registry.stats(2, &interrupt).await.unwrap();
        assert_eq!(stats.queued, 1);
        assert!(stats.opened);
    }

    #[tokio::test]
    async fn test_full_and_empty() {
        let registry = small_registry();
        let interrupt = Interrupt::never();

        assert_eq!(
            registry.pop(0, &interrupt).await.err(),
            Some(MailboxError::Empty(0))
        );

        for _ in 0..3 {
            registry.push(0, b"x", &interrupt).await.unwrap();
        }
        assert_eq!(
            registry.push(0, b"y", &interrupt).await.err(),
            Some(MailboxError::Full { id: 0, capacity: 3 })
        );
        assert_eq!(registry.stats(0, &interrupt).await.unwrap().queued, 3);
    }

    #[tokio::test]
    async fn test_full_at_default_capacity() {
        let registry = MailboxRegistry::with_defaults();
        let interrupt = Interrupt::never();

        for i in 0..MAILSLOT_STORAGE {
            registry
                .push(9, format!("{}", i).as_bytes(), &interrupt)
                .await
                .unwrap();
        }
        assert!(matches!(
            registry.push(9, b"overflow", &interrupt).await,
            Err(MailboxError::Full { .. })
        ));

        let first = registry.pop(9, &interrupt).await.unwrap();
        assert_eq!(first.as_bytes(), b"0");
    }

    #[tokio::test]
    async fn test_oversized_write_truncated() {
        let registry = MailboxRegistry::with_defaults();
        let interrupt = Interrupt::never();
        let payload = vec![b'z'; MESSAGE_SIZE + 100];

        registry.push(0, b"neighbour", &interrupt).await.unwrap();
        let accepted = registry.push(0, &payload, &interrupt).await.unwrap();
        assert_eq!(accepted, MESSAGE_SIZE);

        assert_eq!(
            registry.pop(0, &interrupt).await.unwrap().as_bytes(),
            b"neighbour"
        );
        assert_eq!(registry.pop(0, &interrupt).await.unwrap().len(), MESSAGE_SIZE);
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let registry = MailboxRegistry::new(
            1,
            BufferConfig::default()
                .with_message_size(4)
                .with_oversize(OversizePolicy::Reject),
        );
        let interrupt = Interrupt::never();

        let result = registry.push(0, b"12345", &interrupt).await;
        assert_eq!(
            result.err(),
            Some(MailboxError::Oversized {
                id: 0,
                len: 5,
                limit: 4
            })
        );
        assert_eq!(registry.stats(0, &interrupt).await.unwrap().queued, 0);
    }

    #[tokio::test]
    async fn test_lifo_registry() {
        let registry =
            MailboxRegistry::new(1, BufferConfig::default().with_order(DeliveryOrder::Lifo));
        let interrupt = Interrupt::never();

        registry.push(0, b"A", &interrupt).await.unwrap();
        registry.push(0, b"B", &interrupt).await.unwrap();

        assert_eq!(registry.pop(0, &interrupt).await.unwrap().as_bytes(), b"B");
        assert_eq!(registry.pop(0, &interrupt).await.unwrap().as_bytes(), b"A");
    }

    #[tokio::test]
    async fn test_busy_push_does_not_mutate() {
        let registry = small_registry();
        registry.push(0, b"existing", &Interrupt::never()).await.unwrap();

        let held = registry
            .instance(0)
            .unwrap()
            .lock(&Interrupt::never(), None)
            .await
            .unwrap();

        let (handle, interrupt) = Interrupt::pair();
        handle.trigger();

        assert_eq!(
            registry.push(0, b"new", &interrupt).await.err(),
            Some(MailboxError::Busy(0))
        );
        assert_eq!(
            registry.pop(0, &interrupt).await.err(),
            Some(MailboxError::Busy(0))
        );
        assert_eq!(held.len(), 1);
        drop(held);

        assert_eq!(registry.stats(0, &Interrupt::never()).await.unwrap().queued, 1);
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let registry = small_registry().with_lock_timeout(Some(Duration::from_millis(10)));
        let _held = registry.instance(1).unwrap().try_lock().unwrap();

        assert_eq!(
            registry.push(1, b"late", &Interrupt::never()).await.err(),
            Some(MailboxError::Busy(1))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interrupt_wakes_blocked_writer() {
        let registry = Arc::new(small_registry());
        let held = registry.instance(0).unwrap().try_lock().unwrap();

        let (handle, interrupt) = Interrupt::pair();
        let writer = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.push(0, b"blocked", &interrupt).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), writer)
            .await
            .expect("writer stayed blocked")
            .unwrap();
        assert_eq!(result, Err(MailboxError::Busy(0)));
        assert!(held.is_empty());
    }

    #[tokio::test]
    async fn test_other_instance_not_blocked() {
        let registry = small_registry();
        let _held = registry.instance(0).unwrap().try_lock().unwrap();

        let result = tokio::time::timeout(
            Duration::from_millis(500),
            registry.push(1, b"independent", &Interrupt::never()),
        )
        .await
        .expect("push on another mailbox waited for a foreign lock");
        assert_eq!(result, Ok(11));
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = small_registry();
        let interrupt = Interrupt::never();

        registry.push(2, b"a", &interrupt).await.unwrap();
        registry.push(2, b"b", &interrupt).await.unwrap();

        assert_eq!(registry.clear(2, &interrupt).await.unwrap(), 2);
        assert_eq!(
            registry.pop(2, &interrupt).await.err(),
            Some(MailboxError::Empty(2))
        );
    }

    #[tokio::test]
    async fn test_stats_serialization() {
        let registry = small_registry();
        registry.open(3).unwrap();

        let stats = registry.stats(3, &Interrupt::never()).await.unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["opened"], true);
        assert_eq!(json["capacity"], 3);
    }
}

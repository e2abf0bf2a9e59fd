//! Cooperative interruption of lock waits
//!
//! An [`Interrupt`] is handed to every operation that may wait for a mailbox lock.
//! Firing its [`InterruptHandle`] makes pending and future waits give up with
//! `Busy`. Operations that already hold the lock are never cut short.

use tokio::sync::watch;

/// Receiving side of an interrupt signal
///
/// Cheap to clone. All clones observe the same handle.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    rx: Option<watch::Receiver<bool>>,
}

/// Triggering side of an interrupt signal
#[derive(Debug)]
pub struct InterruptHandle {
    tx: watch::Sender<bool>,
}

impl Interrupt {
    /// Create a connected handle/interrupt pair
    pub fn pair() -> (InterruptHandle, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptHandle { tx }, Interrupt { rx: Some(rx) })
    }

    /// An interrupt that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// True if the handle has fired and not been reset
    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve once the handle fires
    ///
    /// Never resolves for [`Interrupt::never`] or when the handle is dropped
    /// without firing.
    pub async fn triggered(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };

        let mut rx = rx.clone();
        let outcome = rx.wait_for(|fired| *fired).await.map(|_| ());
        if outcome.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl InterruptHandle {
    /// Fire the interrupt
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arm after a trigger so later waits block again
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// A new receiver bound to this handle
    pub fn interrupt(&self) -> Interrupt {
        Interrupt {
            rx: Some(self.tx.subscribe()),
        }
    }
}

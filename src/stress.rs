//! Concurrent writer stress run
//!
//! Spawns independent writer tasks against one mailbox, then drains it and checks
//! that every accepted message comes back exactly once.

use crate::device::{DeviceEndpoint, ReadData};
use crate::mailbox::{Interrupt, MailboxError};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Parameters of a stress run
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Minor number of the target mailbox
    pub minor: u32,
    /// Number of concurrent writer tasks
    pub writers: usize,
    /// Messages each writer attempts
    pub messages_per_writer: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            minor: 0,
            writers: 8,
            messages_per_writer: 32,
        }
    }
}

impl StressConfig {
    /// Total writes the run will attempt, saturating at `usize::MAX`
    pub fn attempted(&self) -> usize {
        self.writers.saturating_mul(self.messages_per_writer)
    }
}

/// Outcome of a stress run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StressReport {
    pub writers: usize,
    pub attempted: usize,
    pub accepted: usize,
    pub rejected_full: usize,
    pub rejected_busy: usize,
    pub drained: usize,
    pub duplicates: usize,
    pub unexpected: usize,
    pub missing: usize,
    pub elapsed_ms: u128,
}

impl StressReport {
    /// True when no message was lost, duplicated or invented
    pub fn is_consistent(&self) -> bool {
        self.duplicates == 0
            && self.unexpected == 0
            && self.missing == 0
            && self.drained == self.accepted
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Default)]
struct WriterTally {
    accepted: Vec<String>,
    rejected_full: usize,
    rejected_busy: usize,
}

/// Run `config.writers` concurrent writers, then drain and verify the mailbox
///
/// The mailbox is opened for the run and closed afterwards, also when the run
/// fails; it must not be open already. Messages queued before the run are
/// drained and counted as unexpected. A failed run discards whatever the
/// writers left queued.
pub async fn run(device: Arc<DeviceEndpoint>, config: &StressConfig) -> crate::Result<StressReport> {
    let started = Instant::now();
    let interrupt = Interrupt::never();

    device.open(config.minor)?;

    tracing::info!(
        minor = config.minor,
        writers = config.writers,
        messages_per_writer = config.messages_per_writer,
        "Starting stress run"
    );

    let outcome = exercise(&device, config, &interrupt).await;
    if outcome.is_err() {
        discard_leftovers(&device, config.minor, &interrupt).await;
    }
    let closed = device.close(config.minor, &interrupt).await;

    let mut report = match outcome {
        Ok(report) => {
            closed?;
            report
        }
        Err(e) => {
            if let Err(close_err) = closed {
                tracing::warn!(minor = config.minor, error = %close_err, "Failed to close mailbox after stress failure");
            }
            return Err(e);
        }
    };
    report.elapsed_ms = started.elapsed().as_millis();

    if report.is_consistent() {
        tracing::info!(accepted = report.accepted, drained = report.drained, "Stress run consistent");
    } else {
        tracing::error!(?report, "Stress run found lost or duplicated messages");
    }

    Ok(report)
}

async fn exercise(
    device: &Arc<DeviceEndpoint>,
    config: &StressConfig,
    interrupt: &Interrupt,
) -> crate::Result<StressReport> {
    let handles: Vec<_> = (0..config.writers)
        .map(|writer| {
            let device = Arc::clone(device);
            let minor = config.minor;
            let count = config.messages_per_writer;
            tokio::spawn(async move { write_batch(&device, minor, writer, count).await })
        })
        .collect();

    let mut expected = HashSet::new();
    let mut report = StressReport {
        writers: config.writers,
        attempted: config.attempted(),
        ..StressReport::default()
    };

    for joined in join_all(handles).await {
        let tally = joined.map_err(|e| crate::MailslotError::Other(format!("Writer task failed: {}", e)))??;
        report.accepted += tally.accepted.len();
        report.rejected_full += tally.rejected_full;
        report.rejected_busy += tally.rejected_busy;
        expected.extend(tally.accepted);
    }

    let mut seen = HashSet::new();
    loop {
        let outcome = device.read(config.minor, 0, interrupt).await?;
        let msg = match outcome.data {
            ReadData::Message(msg) => msg,
            ReadData::NoData | ReadData::EndOfCycle => break,
        };

        report.drained += 1;
        let text = msg.to_string_lossy().into_owned();
        if !expected.contains(&text) {
            report.unexpected += 1;
        } else if !seen.insert(text) {
            report.duplicates += 1;
        }
    }
    report.missing = expected.len() - seen.len();

    Ok(report)
}

async fn discard_leftovers(device: &DeviceEndpoint, minor: u32, interrupt: &Interrupt) {
    let cleared = match device.resolve(minor) {
        Ok(id) => device.registry().clear(id, interrupt).await,
        Err(e) => Err(e),
    };

    match cleared {
        Ok(discarded) => {
            tracing::warn!(minor, discarded, "Discarded messages left by failed stress run")
        }
        Err(e) => tracing::warn!(minor, error = %e, "Failed to discard messages after stress failure"),
    }
}

async fn write_batch(
    device: &DeviceEndpoint,
    minor: u32,
    writer: usize,
    count: usize,
) -> crate::Result<WriterTally> {
    let interrupt = Interrupt::never();
    let mut tally = WriterTally::default();

    for seq in 0..count {
        let payload = format!("w{}-m{}", writer, seq);
        match device.write(minor, payload.as_bytes(), &interrupt).await {
            Ok(_) => tally.accepted.push(payload),
            Err(MailboxError::Full { .. }) => tally.rejected_full += 1,
            Err(e) if e.is_busy() => tally.rejected_busy += 1,
            Err(e) => return Err(e.into()),
        }
        tokio::task::yield_now().await;
    }

    Ok(tally)
}

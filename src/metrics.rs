//! Prometheus metrics for mailbox traffic
//!
//! Process-wide counters shared by every registry in the process.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

lazy_static! {
    /// Counter: messages accepted into a mailbox
    pub static ref MESSAGES_PUSHED: Counter = register_counter!(
        "mailslot_messages_pushed_total",
        "Messages accepted into a mailbox"
    )
    .expect("Failed to create messages_pushed metric");

    /// Counter: messages stored after truncation to the size limit
    pub static ref MESSAGES_TRUNCATED: Counter = register_counter!(
        "mailslot_messages_truncated_total",
        "Messages truncated to the message size limit"
    )
    .expect("Failed to create messages_truncated metric");

    /// Counter: messages removed by a read
    pub static ref MESSAGES_POPPED: Counter = register_counter!(
        "mailslot_messages_popped_total",
        "Messages delivered to a reader"
    )
    .expect("Failed to create messages_popped metric");

    /// Counter: rejected operations by reason
    pub static ref OPERATIONS_REJECTED: CounterVec = register_counter_vec!(
        "mailslot_operations_rejected_total",
        "Mailbox operations that failed, by reason",
        &["reason"]
    )
    .expect("Failed to create operations_rejected metric");

    /// Gauge: mailboxes currently open
    pub static ref OPEN_MAILBOXES: Gauge = register_gauge!(
        "mailslot_open_mailboxes",
        "Number of currently open mailboxes"
    )
    .expect("Failed to create open_mailboxes metric");

    /// Histogram: time spent waiting for a mailbox lock (seconds)
    pub static ref LOCK_WAIT: Histogram = register_histogram!(
        "mailslot_lock_wait_seconds",
        "Time spent acquiring a mailbox lock",
        vec![0.000_01, 0.000_1, 0.001, 0.01, 0.1, 1.0, 10.0]
    )
    .expect("Failed to create lock_wait metric");
}

/// Record an accepted push
pub fn record_push(truncated: bool) {
    MESSAGES_PUSHED.inc();
    if truncated {
        MESSAGES_TRUNCATED.inc();
    }
}

/// Record a delivered message
pub fn record_pop() {
    MESSAGES_POPPED.inc();
}

/// Record a failed operation
pub fn record_rejection(reason: &str) {
    OPERATIONS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a mailbox transitioning to open
pub fn mailbox_opened() {
    OPEN_MAILBOXES.inc();
}

/// Record a mailbox transitioning to closed
pub fn mailbox_closed() {
    OPEN_MAILBOXES.dec();
}

/// Record how long a lock acquisition took
pub fn observe_lock_wait(seconds: f64) {
    LOCK_WAIT.observe(seconds);
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

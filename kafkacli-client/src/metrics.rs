//! Delivery counters shared by the consumer, the claim workers and the producer

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters. One instance is created per run and passed explicitly
/// to every component that records into it.
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    // Consumer metrics
    pub records_delivered: AtomicU64,
    pub records_filtered: AtomicU64,
    pub offsets_marked: AtomicU64,
    pub mark_errors: AtomicU64,
    pub stream_errors: AtomicU64,

    // Producer metrics
    pub records_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message that passed the filter and was displayed
    pub fn record_delivered(&self) {
        self.records_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message rejected by the filter
    pub fn record_filtered(&self) {
        self.records_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_marked(&self) {
        self.offsets_marked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mark_error(&self) {
        self.mark_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transient error surfaced by the consumer stream
    pub fn record_stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.records_delivered.load(Ordering::Relaxed)
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            records_filtered: self.records_filtered.load(Ordering::Relaxed),
            offsets_marked: self.offsets_marked.load(Ordering::Relaxed),
            mark_errors: self.mark_errors.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_delivered: u64,
    pub records_filtered: u64,
    pub offsets_marked: u64,
    pub mark_errors: u64,
    pub stream_errors: u64,
    pub records_sent: u64,
    pub send_errors: u64,
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-stage counters, shared between the worker thread and the pipeline owner
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Tokens taken from upstream
    received: Arc<AtomicU64>,
    /// Tokens handed downstream
    forwarded: Arc<AtomicU64>,
    /// Tokens rejected by a predicate
    dropped: Arc<AtomicU64>,
    /// Tokens pushed out of a full ring buffer
    evicted: Arc<AtomicU64>,
    /// Tokens still buffered when the stage was cancelled
    discarded: Arc<AtomicU64>,
    /// Non-empty buffer flushes
    flushes: Arc<AtomicU64>,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            evicted: Arc::new(AtomicU64::new(0)),
            discarded: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_evicted(&self, total: u64) {
        self.evicted.store(total, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn total_discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn total_flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.total_received(),
            forwarded: self.total_forwarded(),
            dropped: self.total_dropped(),
            evicted: self.total_evicted(),
            discarded: self.total_discarded(),
            flushes: self.total_flushes(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub evicted: u64,
    pub discarded: u64,
    pub flushes: u64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Forwarded: {}, Dropped: {}, Evicted: {}, Discarded: {}, \
             Flushes: {}, Elapsed: {:.2}s",
            self.received,
            self.forwarded,
            self.dropped,
            self.evicted,
            self.discarded,
            self.flushes,
            self.elapsed.as_secs_f64()
        )
    }
}

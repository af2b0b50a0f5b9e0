use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub lines_filtered: u64,
    pub lines_rejected: u64,
    pub packets_accepted: u64,
    pub flushes_completed: u64,
    pub flushes_failed: u64,
    pub bytes_accounted: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines={} filtered={} rejected={} packets={} flushes={} failed_flushes={} bytes={}",
            self.lines_read,
            self.lines_filtered,
            self.lines_rejected,
            self.packets_accepted,
            self.flushes_completed,
            self.flushes_failed,
            self.bytes_accounted,
        )
    }
}

#[derive(Debug, Default)]
struct Counters {
    lines_read: AtomicU64,
    lines_filtered: AtomicU64,
    lines_rejected: AtomicU64,
    packets_accepted: AtomicU64,
    flushes_completed: AtomicU64,
    flushes_failed: AtomicU64,
    bytes_accounted: AtomicU64,
}

/// Counters shared between the ingestion task and the flush worker
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    counters: Arc<Counters>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_read(&self) {
        self.counters.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn line_filtered(&self) {
        self.counters.lines_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn line_rejected(&self) {
        self.counters.lines_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_accepted(&self) {
        self.counters.packets_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush_completed(&self, bytes: u64) {
        self.counters.flushes_completed.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .counters
            .bytes_accounted
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(bytes))
            });
    }

    pub fn flush_failed(&self) {
        self.counters.flushes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            lines_read: c.lines_read.load(Ordering::Relaxed),
            lines_filtered: c.lines_filtered.load(Ordering::Relaxed),
            lines_rejected: c.lines_rejected.load(Ordering::Relaxed),
            packets_accepted: c.packets_accepted.load(Ordering::Relaxed),
            flushes_completed: c.flushes_completed.load(Ordering::Relaxed),
            flushes_failed: c.flushes_failed.load(Ordering::Relaxed),
            bytes_accounted: c.bytes_accounted.load(Ordering::Relaxed),
        }
    }
}

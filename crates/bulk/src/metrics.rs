//! Bulk path counters
//!
//! Shared by the assembler and committer; read by status reporting.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::committer::CommitReport;
use crate::policy::FlushTrigger;

#[derive(Debug, Default)]
pub struct BulkMetrics {
    records_accepted: AtomicU64,
    records_rejected: AtomicU64,
    flushes_count: AtomicU64,
    flushes_bytes: AtomicU64,
    flushes_timer: AtomicU64,
    flushes_shutdown: AtomicU64,
    batches_committed: AtomicU64,
    commit_failures: AtomicU64,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl BulkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, trigger: FlushTrigger) {
        let counter = match trigger {
            FlushTrigger::Count => &self.flushes_count,
            FlushTrigger::Bytes => &self.flushes_bytes,
            FlushTrigger::Timer => &self.flushes_timer,
            FlushTrigger::Shutdown => &self.flushes_shutdown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_committed(&self, report: &CommitReport) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
        self.datagrams_sent
            .fetch_add(report.datagrams as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(report.bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BulkMetricsSnapshot {
        let flushes_count = self.flushes_count.load(Ordering::Relaxed);
        let flushes_bytes = self.flushes_bytes.load(Ordering::Relaxed);
        let flushes_timer = self.flushes_timer.load(Ordering::Relaxed);
        let flushes_shutdown = self.flushes_shutdown.load(Ordering::Relaxed);

        BulkMetricsSnapshot {
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            batches_flushed: flushes_count + flushes_bytes + flushes_timer + flushes_shutdown,
            flushes_count,
            flushes_bytes,
            flushes_timer,
            flushes_shutdown,
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMetricsSnapshot {
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub batches_flushed: u64,
    pub flushes_count: u64,
    pub flushes_bytes: u64,
    pub flushes_timer: u64,
    pub flushes_shutdown: u64,
    pub batches_committed: u64,
    pub commit_failures: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
}

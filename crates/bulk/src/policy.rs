//! Flush policy evaluation

use contracts::FlushPolicy;
use tokio::time::Instant;

use crate::batch::Batch;

/// Why a batch was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// `max_records` reached
    Count,
    /// `max_bytes` reached
    Bytes,
    /// `flush_interval` elapsed since the first record
    Timer,
    /// Input closed with records still open
    Shutdown,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Bytes => "bytes",
            Self::Timer => "timer",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Threshold check, run after every append.
///
/// Because the check follows the append, a batch may overshoot `max_bytes`
/// by at most the size of its last frame.
pub fn check(policy: &FlushPolicy, batch: &Batch) -> Option<FlushTrigger> {
    if batch.is_empty() {
        None
    } else if batch.record_count() >= policy.max_records {
        Some(FlushTrigger::Count)
    } else if batch.byte_len() >= policy.max_bytes {
        Some(FlushTrigger::Bytes)
    } else {
        None
    }
}

/// When the timer must flush `batch`, if it holds anything
pub fn deadline(policy: &FlushPolicy, batch: &Batch) -> Option<Instant> {
    batch.started_at().map(|t| t + policy.flush_interval)
}

//! Delivery metrics
//!
//! Prometheus recorders for the bulk path and the dispatcher, plus an
//! in-memory aggregator for the end-of-run batch summary.

use std::collections::BTreeMap;

use metrics::{counter, histogram};

/// Record a batch handed to the committer
///
/// `trigger` is one of `count`, `bytes`, `timer`, `shutdown`.
pub fn record_batch_flushed(trigger: &'static str, records: usize, bytes: usize) {
    counter!("logpush_batches_flushed_total", "trigger" => trigger).increment(1);
    histogram!("logpush_batch_records").record(records as f64);
    histogram!("logpush_batch_bytes").record(bytes as f64);
}

/// Record a batch fully transmitted
pub fn record_batch_committed(datagrams: usize, bytes: usize) {
    counter!("logpush_datagrams_sent_total").increment(datagrams as u64);
    counter!("logpush_bytes_sent_total").increment(bytes as u64);
}

/// Record a failed transmission; the batch is discarded
pub fn record_commit_failure(records: usize) {
    counter!("logpush_commit_failures_total").increment(1);
    counter!("logpush_records_lost_total").increment(records as u64);
}

/// Record a record the assembler refused (too large for one datagram, or unframeable)
pub fn record_record_rejected(reason: &'static str) {
    counter!("logpush_records_rejected_total", "reason" => reason).increment(1);
}

/// Record a record dropped at a full dispatcher sink queue
pub fn record_sink_dropped(sink_name: &str) {
    counter!("logpush_sink_dropped_total", "sink" => sink_name.to_string()).increment(1);
}

/// Batch metrics aggregator
///
/// Aggregates in memory so a summary can be printed at shutdown.
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    pub batches_committed: u64,
    pub commit_failures: u64,
    pub records_committed: u64,
    pub records_lost: u64,
    pub datagrams_sent: u64,
    pub triggers: BTreeMap<&'static str, u64>,
    batch_records: RunningStats,
    batch_bytes: RunningStats,
}

impl BatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one flushed batch and its commit outcome.
    pub fn update(
        &mut self,
        trigger: &'static str,
        records: usize,
        bytes: usize,
        datagrams: Option<usize>,
    ) {
        *self.triggers.entry(trigger).or_insert(0) += 1;
        self.batch_records.push(records as f64);
        self.batch_bytes.push(bytes as f64);

        match datagrams {
            Some(sent) => {
                self.batches_committed += 1;
                self.records_committed += records as u64;
                self.datagrams_sent += sent as u64;
            }
            None => {
                self.commit_failures += 1;
                self.records_lost += records as u64;
            }
        }
    }

    pub fn summary(&self) -> BatchMetricsSummary {
        let total = self.batches_committed + self.commit_failures;
        let failure_rate = if total > 0 {
            self.commit_failures as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        BatchMetricsSummary {
            batches_committed: self.batches_committed,
            commit_failures: self.commit_failures,
            records_committed: self.records_committed,
            records_lost: self.records_lost,
            datagrams_sent: self.datagrams_sent,
            failure_rate,
            triggers: self.triggers.clone(),
            batch_records: StatsSummary::from(&self.batch_records),
            batch_bytes: StatsSummary::from(&self.batch_bytes),
        }
    }
}

/// Batch metrics summary
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsSummary {
    pub batches_committed: u64,
    pub commit_failures: u64,
    pub records_committed: u64,
    pub records_lost: u64,
    pub datagrams_sent: u64,
    /// Percentage of flushed batches that failed to transmit
    pub failure_rate: f64,
    pub triggers: BTreeMap<&'static str, u64>,
    pub batch_records: StatsSummary,
    pub batch_bytes: StatsSummary,
}

impl std::fmt::Display for BatchMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bulk Delivery Summary ===")?;
        writeln!(f, "Batches committed: {}", self.batches_committed)?;
        writeln!(
            f,
            "Commit failures: {} ({:.2}%)",
            self.commit_failures, self.failure_rate
        )?;
        writeln!(f, "Records committed: {}", self.records_committed)?;
        writeln!(f, "Records lost: {}", self.records_lost)?;
        writeln!(f, "Datagrams sent: {}", self.datagrams_sent)?;
        writeln!(f, "Records per batch: {}", self.batch_records)?;
        writeln!(f, "Bytes per batch: {}", self.batch_bytes)?;

        if !self.triggers.is_empty() {
            writeln!(f, "Flush triggers:")?;
            for (trigger, count) in &self.triggers {
                writeln!(f, "  {}: {}", trigger, count)?;
            }
        }

        Ok(())
    }
}

/// Stats summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

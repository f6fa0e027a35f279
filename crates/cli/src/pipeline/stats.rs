//! End-of-run statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use broker::BrokerStats;
use bulk::BulkMetricsSnapshot;
use contracts::OpenFileInfo;
use dispatcher::MetricsSnapshot;
use observability::BatchMetricsSummary;

use crate::error::CliError;

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub duration: Duration,

    /// Per-source counters as of the stop request
    pub sources: BTreeMap<String, OpenFileInfo>,

    pub records_dispatched: u64,

    pub sinks: BTreeMap<String, MetricsSnapshot>,

    pub broker: BrokerStats,

    pub bulk: Option<BatchMetricsSummary>,

    pub bulk_counters: BulkMetricsSnapshot,

    /// Source failure that ended the run, if any
    pub failure: Option<CliError>,
}

impl PipelineStats {
    pub fn lines_read(&self) -> u64 {
        self.sources.values().map(|s| s.lines_read).sum()
    }

    /// Records per second through the dispatcher
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.records_dispatched as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Pipeline Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read());
        println!("   ├─ Records dispatched: {}", self.records_dispatched);
        println!("   └─ Throughput: {:.2} records/s", self.throughput());

        if !self.sources.is_empty() {
            println!("\nSources");
            for (name, info) in &self.sources {
                println!(
                    "   ├─ {}: {} lines, {} errors",
                    name, info.lines_read, info.errors_count
                );
            }
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, sink) in &self.sinks {
                println!(
                    "   ├─ {}: {} written, {} failed, {} dropped",
                    name, sink.written, sink.failed, sink.dropped
                );
            }
        }

        println!("\nRealtime");
        println!("   ├─ Published: {}", self.broker.published);
        println!("   ├─ Dropped (slow subscribers): {}", self.broker.dropped);
        println!("   └─ Dropped (publish backlog): {}", self.broker.backlog_dropped);

        println!("\nBulk");
        println!("   ├─ Accepted: {}", self.bulk_counters.records_accepted);
        println!("   ├─ Rejected: {}", self.bulk_counters.records_rejected);
        println!("   ├─ Datagrams: {}", self.bulk_counters.datagrams_sent);
        println!("   └─ Bytes: {}", self.bulk_counters.bytes_sent);

        if let Some(summary) = &self.bulk {
            println!("\n{summary}");
        }

        if let Some(failure) = &self.failure {
            println!("Stopped by failure: {failure}");
        }

        println!();
    }
}

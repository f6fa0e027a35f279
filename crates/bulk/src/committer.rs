//! Committer
//!
//! Transmits flushed batches, one at a time, and hands every buffer back to
//! the assembler whether or not the transmission worked.

use std::sync::Arc;

use observability::{
    record_batch_committed, record_commit_failure, BatchMetricsAggregator, BatchMetricsSummary,
};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::assembler::Flush;
use crate::batch::Batch;
use crate::error::TransportError;
use crate::metrics::BulkMetrics;
use crate::transport::BulkTransport;

/// Result of one successful commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub records: usize,
    pub datagrams: usize,
    pub bytes: usize,
}

pub struct Committer<T> {
    transport: T,
    max_datagram: usize,
    metrics: Arc<BulkMetrics>,
}

impl<T> Committer<T>
where
    T: BulkTransport,
{
    pub fn new(transport: T, max_datagram: usize, metrics: Arc<BulkMetrics>) -> Self {
        Self {
            transport,
            max_datagram,
            metrics,
        }
    }

    /// Transmit `batch` and return it emptied, together with the outcome.
    ///
    /// A batch larger than the datagram limit goes out as several datagrams,
    /// each holding whole header+payload pairs. The first transport error
    /// aborts the commit; nothing is retried.
    pub async fn commit(&mut self, mut batch: Batch) -> (Batch, Result<CommitReport, TransportError>) {
        let result = self.transmit(&batch).await;
        batch.clear();
        (batch, result)
    }

    async fn transmit(&mut self, batch: &Batch) -> Result<CommitReport, TransportError> {
        let mut report = CommitReport {
            records: batch.record_count(),
            ..Default::default()
        };
        for datagram in batch.datagrams(self.max_datagram) {
            report.bytes += self.transport.send(datagram).await?;
            report.datagrams += 1;
        }
        Ok(report)
    }

    /// Drain flushes until the assembler closes the handoff channel.
    #[instrument(name = "committer_run", skip_all, fields(endpoint = %self.transport.endpoint()))]
    pub async fn run(mut self, mut flushes: mpsc::Receiver<Flush>, returns: mpsc::Sender<Batch>) -> BatchMetricsSummary {
        debug!("committer started");
        let mut aggregator = BatchMetricsAggregator::new();

        while let Some(Flush { batch, trigger }) = flushes.recv().await {
            let records = batch.record_count();
            let bytes = batch.byte_len();
            let slot = batch.slot();

            let (batch, result) = self.commit(batch).await;
            match result {
                Ok(report) => {
                    self.metrics.record_committed(&report);
                    record_batch_committed(report.datagrams, report.bytes);
                    aggregator.update(trigger.as_str(), records, bytes, Some(report.datagrams));
                    debug!(slot, records, bytes, datagrams = report.datagrams, "batch committed");
                }
                Err(e) => {
                    self.metrics.record_commit_failure();
                    record_commit_failure(records);
                    aggregator.update(trigger.as_str(), records, bytes, None);
                    warn!(slot, records, error = %e, "batch discarded after transport error");
                }
            }

            if returns.send(batch).await.is_err() {
                debug!("assembler gone, dropping returned buffer");
            }
        }

        let summary = aggregator.summary();
        info!(
            batches = summary.batches_committed,
            failures = summary.commit_failures,
            "committer stopped"
        );
        summary
    }
}

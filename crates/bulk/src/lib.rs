//! Bulk delivery
//!
//! Records are framed as index-action/document pairs, grouped into batches
//! by a count/bytes/timer policy, and sent as UDP datagrams. The assembler
//! and committer run as two tasks sharing a pair of buffers, so one batch
//! can fill while the other is on the wire.

mod assembler;
mod batch;
mod committer;
mod error;
mod framing;
mod metrics;
mod policy;
mod receiver;
mod transport;

use std::sync::Arc;

use contracts::{BulkConfig, Record, UdpEndpoint};
use observability::BatchMetricsSummary;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

pub use assembler::{AssemblerChannels, BatchAssembler, Flush};
pub use batch::{Batch, Datagrams};
pub use committer::{CommitReport, Committer};
pub use error::{BulkError, TransportError};
pub use framing::{index_name, write_frame, IndexAction, IndexTarget, DOCUMENT_TYPE, INDEX_PREFIX};
pub use metrics::{BulkMetrics, BulkMetricsSnapshot};
pub use policy::FlushTrigger;
pub use receiver::{parse_datagram, BulkDocument};
pub use transport::{BulkTransport, MemoryTransport, UdpTransport};

pub type Result<T> = std::result::Result<T, BulkError>;

/// Running assembler + committer pair
pub struct BulkPipeline {
    records: mpsc::Sender<Record>,
    assembler: JoinHandle<Result<()>>,
    committer: JoinHandle<BatchMetricsSummary>,
    metrics: Arc<BulkMetrics>,
}

impl BulkPipeline {
    /// Spawn the pipeline over an arbitrary transport.
    pub fn spawn<T>(config: &BulkConfig, transport: T) -> Self
    where
        T: BulkTransport + 'static,
    {
        let metrics = Arc::new(BulkMetrics::new());
        let (assembler, channels) = BatchAssembler::new(
            config.flush_policy(),
            config.max_datagram_bytes,
            config.queue_capacity,
            metrics.clone(),
        );
        let AssemblerChannels {
            records,
            flushes,
            returns,
        } = channels;

        let committer = Committer::new(transport, config.max_datagram_bytes, metrics.clone());

        info!(
            endpoint = %config.endpoint,
            max_records = config.max_records,
            max_bytes = config.max_bytes,
            flush_interval_ms = config.flush_interval_ms,
            "bulk pipeline started"
        );

        Self {
            records,
            assembler: tokio::spawn(assembler.run()),
            committer: tokio::spawn(committer.run(flushes, returns)),
            metrics,
        }
    }

    /// Spawn the pipeline sending to the configured UDP endpoint.
    pub fn from_config(config: &BulkConfig) -> Result<Self> {
        let endpoint: UdpEndpoint = config.endpoint.parse()?;
        Ok(Self::spawn(config, UdpTransport::new(endpoint)))
    }

    /// Input side; the pipeline drains once every clone is dropped.
    pub fn sender(&self) -> mpsc::Sender<Record> {
        self.records.clone()
    }

    pub fn metrics(&self) -> Arc<BulkMetrics> {
        self.metrics.clone()
    }

    /// Close this handle's input and wait for the last batch to be committed.
    ///
    /// Senders handed out by [`sender`](Self::sender) must be dropped first,
    /// or this waits for them.
    pub async fn shutdown(self) -> Result<BatchMetricsSummary> {
        drop(self.records);

        let assembled = self
            .assembler
            .await
            .map_err(|e| BulkError::Task(e.to_string()))?;
        let summary = self
            .committer
            .await
            .map_err(|e| BulkError::Task(e.to_string()))?;
        assembled?;

        info!(
            batches = summary.batches_committed,
            failures = summary.commit_failures,
            "bulk pipeline stopped"
        );
        Ok(summary)
    }
}

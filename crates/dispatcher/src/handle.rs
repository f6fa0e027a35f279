//! SinkHandle - one sink behind its own queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use contracts::{Record, RecordSink};
use observability::record_sink_dropped;

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<Record>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker draining a queue of `queue_capacity` records into `sink`.
    pub fn spawn<S: RecordSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(sink_worker(sink, rx, Arc::clone(&metrics)));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a record without waiting.
    ///
    /// A full queue drops the offered record and counts it; records already
    /// queued keep their place. Returns whether the record was queued.
    pub fn try_send(&self, record: Record) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.metrics.inc_dropped();
                record_sink_dropped(&self.name);
                trace!(sink = %self.name, id = %record.id, "queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue, let the worker drain it, then flush and close the sink.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> Result<MetricsSnapshot, DispatcherError> {
        drop(self.tx);
        self.worker
            .await
            .map_err(|e| DispatcherError::worker(&self.name, e.to_string()))?;

        let snapshot = self.metrics.snapshot();
        if snapshot.dropped > 0 {
            warn!(sink = %self.name, dropped = snapshot.dropped, "sink dropped records");
        }
        debug!(sink = %self.name, written = snapshot.written, "sink handle shut down");
        Ok(snapshot)
    }
}

async fn sink_worker<S: RecordSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Record>,
    metrics: Arc<SinkMetrics>,
) {
    let name = sink.name().to_string();
    debug!(sink = %name, "sink worker started");

    while let Some(record) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&record).await {
            Ok(()) => metrics.inc_written(),
            Err(e) => {
                metrics.inc_failed();
                warn!(sink = %name, id = %record.id, error = %e, "write failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }

    debug!(sink = %name, "sink worker stopped");
}

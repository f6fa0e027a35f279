//! Batch assembler
//!
//! One loop selects over three event sources: a returned buffer, the flush
//! deadline of the open batch, and the next record. Two buffers circulate:
//! the open one being filled, and one that is either spare or in flight at
//! the committer. A flush swaps the spare in. When a flush is due while the
//! other buffer is still in flight, the flush waits for the return and no
//! records are accepted until it has been dispatched.

use std::future::pending;
use std::sync::Arc;

use contracts::{FlushPolicy, Record};
use observability::{record_batch_flushed, record_record_rejected};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use crate::batch::Batch;
use crate::error::BulkError;
use crate::metrics::BulkMetrics;
use crate::policy::{self, FlushTrigger};

/// A closed batch on its way to the committer
#[derive(Debug)]
pub struct Flush {
    pub batch: Batch,
    pub trigger: FlushTrigger,
}

/// The assembler's peers: record input, flush output, buffer return
pub struct AssemblerChannels {
    pub records: mpsc::Sender<Record>,
    pub flushes: mpsc::Receiver<Flush>,
    pub returns: mpsc::Sender<Batch>,
}

pub struct BatchAssembler {
    policy: FlushPolicy,
    max_frame: usize,
    records: mpsc::Receiver<Record>,
    flushes: mpsc::Sender<Flush>,
    returns: mpsc::Receiver<Batch>,
    open: Batch,
    spare: Option<Batch>,
    in_flight: bool,
    pending: Option<FlushTrigger>,
    metrics: Arc<BulkMetrics>,
}

impl BatchAssembler {
    /// Build an assembler with its two buffers.
    ///
    /// `max_frame` is the datagram ceiling; a record whose frame alone is
    /// larger can never be sent and is rejected on accept.
    pub fn new(
        policy: FlushPolicy,
        max_frame: usize,
        queue_capacity: usize,
        metrics: Arc<BulkMetrics>,
    ) -> (Self, AssemblerChannels) {
        let (records_tx, records_rx) = mpsc::channel(queue_capacity.max(1));
        // Single-slot handoff: at most one batch in flight.
        let (flushes_tx, flushes_rx) = mpsc::channel(1);
        let (returns_tx, returns_rx) = mpsc::channel(1);

        let buffer_capacity = policy.max_bytes.saturating_add(max_frame);
        let assembler = Self {
            policy,
            max_frame,
            records: records_rx,
            flushes: flushes_tx,
            returns: returns_rx,
            open: Batch::with_capacity(0, buffer_capacity),
            spare: Some(Batch::with_capacity(1, buffer_capacity)),
            in_flight: false,
            pending: None,
            metrics,
        };
        let channels = AssemblerChannels {
            records: records_tx,
            flushes: flushes_rx,
            returns: returns_tx,
        };
        (assembler, channels)
    }

    /// Run until the record input closes, then flush what is open.
    #[instrument(
        name = "assembler_run",
        skip(self),
        fields(
            max_records = self.policy.max_records,
            max_bytes = self.policy.max_bytes,
            flush_interval_ms = self.policy.flush_interval.as_millis() as u64
        )
    )]
    pub async fn run(mut self) -> Result<(), BulkError> {
        debug!("batch assembler started");

        loop {
            let accepting = self.pending.is_none();
            let deadline = if accepting {
                policy::deadline(&self.policy, &self.open)
            } else {
                None
            };

            tokio::select! {
                biased;

                returned = self.returns.recv(), if self.in_flight => match returned {
                    Some(batch) => self.on_returned(batch).await?,
                    None => return Err(BulkError::CommitterStopped),
                },

                _ = wait_until(deadline) => {
                    self.request_flush(FlushTrigger::Timer).await?;
                }

                record = self.records.recv(), if accepting => match record {
                    Some(record) => self.accept(record).await?,
                    None => break,
                },
            }
        }

        self.drain().await
    }

    async fn accept(&mut self, record: Record) -> Result<(), BulkError> {
        if let Err(e) = self.open.append(&record, Instant::now(), self.max_frame) {
            self.metrics.record_rejected();
            record_record_rejected(e.reason());
            warn!(source = %record.source, id = %record.id, error = %e, "record rejected");
            return Ok(());
        }
        self.metrics.record_accepted();

        if let Some(trigger) = policy::check(&self.policy, &self.open) {
            self.request_flush(trigger).await?;
        }
        Ok(())
    }

    /// Flush the open batch now, or as soon as the spare buffer is back.
    async fn request_flush(&mut self, trigger: FlushTrigger) -> Result<(), BulkError> {
        if self.open.is_empty() {
            return Ok(());
        }
        match self.spare.take() {
            Some(fresh) => {
                let full = std::mem::replace(&mut self.open, fresh);
                self.dispatch(full, trigger).await
            }
            None => {
                debug!(trigger = trigger.as_str(), "flush waiting for in-flight batch");
                self.pending = Some(trigger);
                Ok(())
            }
        }
    }

    async fn dispatch(&mut self, batch: Batch, trigger: FlushTrigger) -> Result<(), BulkError> {
        let records = batch.record_count();
        let bytes = batch.byte_len();
        debug!(
            trigger = trigger.as_str(),
            slot = batch.slot(),
            batch_records = records,
            bytes,
            "flushing batch"
        );
        self.metrics.record_flush(trigger);
        record_batch_flushed(trigger.as_str(), records, bytes);

        self.in_flight = true;
        self.flushes
            .send(Flush { batch, trigger })
            .await
            .map_err(|_| BulkError::CommitterStopped)
    }

    async fn on_returned(&mut self, batch: Batch) -> Result<(), BulkError> {
        self.in_flight = false;
        self.spare = Some(batch);
        match self.pending.take() {
            Some(trigger) => self.request_flush(trigger).await,
            None => Ok(()),
        }
    }

    /// Wait out the in-flight batch, flush the open one, wait again.
    async fn drain(mut self) -> Result<(), BulkError> {
        loop {
            if self.in_flight {
                match self.returns.recv().await {
                    Some(batch) => self.on_returned(batch).await?,
                    None => return Err(BulkError::CommitterStopped),
                }
                continue;
            }
            if self.open.is_empty() {
                break;
            }
            self.request_flush(FlushTrigger::Shutdown).await?;
        }

        info!(
            accepted = self.metrics.snapshot().records_accepted,
            "batch assembler stopped"
        );
        Ok(())
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

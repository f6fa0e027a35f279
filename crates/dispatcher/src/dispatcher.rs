//! Dispatcher - main loop fanning records out to sinks

use std::collections::BTreeMap;
use std::sync::Arc;

use broker::BrokerHandle;
use contracts::{DispatchConfig, Record, RecordSink};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{BroadcastSink, BulkSink, LogSink};

pub const REALTIME_SINK: &str = "realtime";
pub const BULK_SINK: &str = "bulk";
pub const LOG_SINK: &str = "log";

/// Collects sinks before the dispatcher starts
pub struct DispatcherBuilder {
    input: async_channel::Receiver<Record>,
    handles: Vec<SinkHandle>,
    default_capacity: usize,
}

impl DispatcherBuilder {
    pub fn new(input: async_channel::Receiver<Record>) -> Self {
        Self {
            input,
            handles: Vec::new(),
            default_capacity: DispatchConfig::default().queue_capacity,
        }
    }

    /// Queue capacity for sinks added with [`sink`](Self::sink)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Spawn `sink` behind a queue of the default capacity.
    pub fn sink<S: RecordSink + 'static>(self, sink: S) -> Self {
        let capacity = self.default_capacity;
        self.sink_with_capacity(sink, capacity)
    }

    pub fn sink_with_capacity<S: RecordSink + 'static>(mut self, sink: S, capacity: usize) -> Self {
        self.handles.push(SinkHandle::spawn(sink, capacity));
        self
    }

    /// The standard pair: live broadcast and bulk shipping, plus an
    /// optional log echo.
    pub fn standard(
        input: async_channel::Receiver<Record>,
        config: &DispatchConfig,
        broker: BrokerHandle,
        bulk: mpsc::Sender<Record>,
    ) -> Self {
        let builder = Self::new(input)
            .queue_capacity(config.queue_capacity)
            .sink(BroadcastSink::new(REALTIME_SINK, broker))
            .sink(BulkSink::new(BULK_SINK, bulk));
        if config.log_records {
            builder.sink(LogSink::new(LOG_SINK))
        } else {
            builder
        }
    }

    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sinks = self.handles.len()))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut problem = None;
        if self.handles.is_empty() {
            problem = Some(DispatcherError::NoSinks);
        }
        for (i, handle) in self.handles.iter().enumerate() {
            if self.handles[..i].iter().any(|h| h.name() == handle.name()) {
                problem = Some(DispatcherError::duplicate_sink(handle.name()));
                break;
            }
        }

        if let Some(e) = problem {
            // Workers are already running; stop them before bailing out.
            for handle in self.handles {
                let _ = handle.shutdown().await;
            }
            return Err(e);
        }

        Ok(Dispatcher {
            handles: self.handles,
            input: self.input,
        })
    }
}

/// Per-sink counters readable while the dispatcher runs
#[derive(Clone, Default)]
pub struct SinkMetricsSet(Vec<(String, Arc<SinkMetrics>)>);

impl SinkMetricsSet {
    pub fn snapshot(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.0
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
            .collect()
    }
}

/// Final counts once the input has closed and every sink drained
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub records: u64,
    pub sinks: BTreeMap<String, MetricsSnapshot>,
}

pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input: async_channel::Receiver<Record>,
}

impl Dispatcher {
    pub fn sink_metrics(&self) -> SinkMetricsSet {
        SinkMetricsSet(
            self.handles
                .iter()
                .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
                .collect(),
        )
    }

    /// Fan records out until the input closes, then drain every sink.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(self) -> Result<DispatchReport, DispatcherError> {
        info!(sinks = self.handles.len(), "dispatcher started");

        let mut records: u64 = 0;
        while let Ok(record) = self.input.recv().await {
            records += 1;
            for handle in &self.handles {
                handle.try_send(record.clone());
            }

            if records.is_multiple_of(1000) {
                debug!(records, "dispatcher progress");
            }
        }

        info!(records, "dispatcher input closed, draining sinks");

        let mut report = DispatchReport {
            records,
            sinks: BTreeMap::new(),
        };
        let mut first_error = None;
        for handle in self.handles {
            let name = handle.name().to_string();
            match handle.shutdown().await {
                Ok(snapshot) => {
                    report.sinks.insert(name, snapshot);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("dispatcher shutdown complete");
                Ok(report)
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<DispatchReport, DispatcherError>> {
        tokio::spawn(self.run())
    }
}

//! Ingestion Pipeline main entry

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use contracts::{Record, RecordSource};
use metrics::counter;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use crate::counters::{CounterRegistry, FileCounters};
use crate::error::{IngestionError, Result};
use crate::file_source::FileRecordSource;
use crate::formatter::RecordFormatter;

/// How a tailing task ended
#[derive(Debug)]
pub struct SourceExit {
    pub source_name: String,
    /// Lines read on success (source exhausted), or the fatal error
    pub result: Result<u64>,
}

/// Ingestion Pipeline
///
/// Owns one tailing task per registered source. Every task formats its lines
/// and delivers them, in order, into a single shared bounded channel.
pub struct IngestionPipeline {
    formatter: RecordFormatter,
    registry: CounterRegistry,
    tx: Option<Sender<Record>>,
    rx: Option<Receiver<Record>>,
    tasks: JoinSet<SourceExit>,
    task_names: HashMap<Id, String>,
}

impl IngestionPipeline {
    /// Create a pipeline whose delivery channel holds `channel_capacity` records
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_formatter(channel_capacity, RecordFormatter::from_system())
    }

    pub fn with_formatter(channel_capacity: usize, formatter: RecordFormatter) -> Self {
        let (tx, rx) = bounded(channel_capacity);
        Self {
            formatter,
            registry: CounterRegistry::new(),
            tx: Some(tx),
            rx: Some(rx),
            tasks: JoinSet::new(),
            task_names: HashMap::new(),
        }
    }

    /// Open `path` and start tailing it under `name`.
    ///
    /// # Errors
    /// `OpenFailed` if the file cannot be opened; `AlreadyRegistered` on a
    /// duplicate name.
    #[instrument(name = "ingestion_register_file", skip(self, path), fields(source = %name))]
    pub async fn register_file(&mut self, name: &str, path: impl Into<PathBuf>) -> Result<()> {
        if self.task_names.values().any(|n| n == name) {
            return Err(IngestionError::AlreadyRegistered {
                source_name: name.to_string(),
            });
        }
        let source = FileRecordSource::open(name, path).await?;
        self.register(source)
    }

    /// Start tailing any `RecordSource`.
    #[instrument(name = "ingestion_register", skip(self, source), fields(source = %source.name()))]
    pub fn register<S>(&mut self, source: S) -> Result<()>
    where
        S: RecordSource + 'static,
    {
        let name = source.name().to_string();
        if self.task_names.values().any(|n| *n == name) {
            return Err(IngestionError::AlreadyRegistered { source_name: name });
        }

        let tx = self.tx.clone().ok_or_else(|| IngestionError::TargetClosed {
            source_name: name.clone(),
        })?;
        let counters = self.registry.register(&name);
        let registry = self.registry.clone();
        let formatter = self.formatter.clone();

        let task_name = name.clone();
        let handle = self.tasks.spawn(async move {
            let result = tail_source(source, counters, formatter, tx).await;
            registry.unregister(&task_name);
            SourceExit {
                source_name: task_name,
                result,
            }
        });
        self.task_names.insert(handle.id(), name.clone());

        info!(source = %name, "source registered");
        Ok(())
    }

    /// Wait for the next tailing task to end.
    ///
    /// Returns `None` when no task is running.
    pub async fn next_exit(&mut self) -> Option<SourceExit> {
        let joined = self.tasks.join_next_with_id().await?;
        let exit = match joined {
            Ok((id, exit)) => {
                self.task_names.remove(&id);
                exit
            }
            Err(join_err) => {
                let source_name = self.task_names.remove(&join_err.id()).unwrap_or_default();
                self.registry.unregister(&source_name);
                SourceExit {
                    result: Err(IngestionError::TaskFailed {
                        source_name: source_name.clone(),
                        message: join_err.to_string(),
                    }),
                    source_name,
                }
            }
        };
        Some(exit)
    }

    /// Stop every source and close the delivery channel.
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub async fn stop_all(&mut self) {
        info!(count = self.tasks.len(), "stopping all sources");
        self.tx = None;
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        for name in self.task_names.drain().map(|(_, name)| name) {
            self.registry.unregister(&name);
        }
    }

    /// Get the delivery channel receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<Record>> {
        self.rx.take()
    }

    /// Counter registry shared with status reporting
    pub fn registry(&self) -> CounterRegistry {
        self.registry.clone()
    }

    pub fn source_count(&self) -> usize {
        self.tasks.len()
    }
}

/// Read, format and deliver until the source ends or fails.
async fn tail_source<S>(
    mut source: S,
    counters: Arc<FileCounters>,
    formatter: RecordFormatter,
    tx: Sender<Record>,
) -> Result<u64>
where
    S: RecordSource,
{
    let name: Arc<str> = Arc::from(source.name());
    let lines_read = counter!("logpush_lines_read_total", "source" => name.to_string());
    let format_errors = counter!("logpush_format_errors_total", "source" => name.to_string());
    let mut total = 0u64;

    loop {
        let line = match source.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(source = %name, lines = total, "source exhausted");
                return Ok(total);
            }
            Err(e) => {
                counters.record_error();
                counter!("logpush_source_errors_total", "source" => name.to_string()).increment(1);
                error!(source = %name, error = %e, "source read failed");
                return Err(e.into());
            }
        };

        total += 1;
        counters.record_line();
        lines_read.increment(1);

        let record = match formatter.format(&name, &line) {
            Ok(record) => record,
            Err(e) => {
                counters.record_error();
                format_errors.increment(1);
                warn!(source = %name, error = %e, "dropping unformattable line");
                continue;
            }
        };

        if tx.send(record).await.is_err() {
            return Err(IngestionError::TargetClosed {
                source_name: name.to_string(),
            });
        }
    }
}

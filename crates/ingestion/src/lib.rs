//! # Ingestion Pipeline
//!
//! Record source module.
//!
//! Responsibilities:
//! - Register sources (file tail or any `RecordSource`)
//! - Format raw lines into `Record`s (JSON envelope, id, timestamp, hostname)
//! - Keep per-source `{linesRead, errorsCount}` counters
//! - Deliver records, in order, into one bounded async-channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestionPipeline;
//!
//! let mut pipeline = IngestionPipeline::new(1024);
//! pipeline.register_file("app", "/var/log/app.log").await?;
//!
//! let rx = pipeline.take_receiver().unwrap();
//! while let Ok(record) = rx.recv().await {
//!     // Fan out
//! }
//! ```

mod counters;
mod error;
mod file_source;
mod formatter;
mod mock;
mod pipeline;

pub use contracts::{OpenFileInfo, Record};
pub use counters::{CounterRegistry, FileCounters};
pub use error::{IngestionError, Result};
pub use file_source::FileRecordSource;
pub use formatter::RecordFormatter;
pub use mock::MockRecordSource;
pub use pipeline::{IngestionPipeline, SourceExit};

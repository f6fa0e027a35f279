//! # Dispatcher
//!
//! Fans the single record stream out to independent sinks.
//!
//! Each sink runs behind its own bounded queue and worker task, so a slow
//! or failing sink loses its own records (counted) and never holds up the
//! source or the other sinks.

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{Record, RecordSink};
pub use dispatcher::{
    DispatchReport, Dispatcher, DispatcherBuilder, SinkMetricsSet, BULK_SINK, LOG_SINK, REALTIME_SINK,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{BroadcastSink, BulkSink, LogSink};

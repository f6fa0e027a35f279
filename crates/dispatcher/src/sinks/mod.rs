//! Sink implementations

mod broadcast;
mod bulk;
mod log;

pub use self::broadcast::BroadcastSink;
pub use self::bulk::BulkSink;
pub use self::log::LogSink;

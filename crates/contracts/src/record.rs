//! Record - the unit flowing from a source to every sink

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logical input line plus its production metadata.
///
/// Records are immutable once produced. Cloning is cheap (the payload and the
/// string fields are reference counted), which is what lets the dispatcher hand
/// the same record to every sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: Uuid,
    /// UTC instant the line was read
    pub timestamp: DateTime<Utc>,
    /// Registered source name
    pub source: Arc<str>,
    pub hostname: Arc<str>,
    /// Formatted payload (the JSON line envelope)
    pub payload: Bytes,
}

impl Record {
    /// Create a record stamped with a fresh id and the current time.
    pub fn new(
        source: impl Into<Arc<str>>,
        hostname: impl Into<Arc<str>>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            hostname: hostname.into(),
            payload: payload.into(),
        }
    }

    /// Override the production timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// JSON envelope wrapped around every line before it leaves ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMessage {
    #[serde(rename = "@message")]
    pub message: String,

    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "@source_filename")]
    pub source_filename: String,

    #[serde(rename = "@source_hostname")]
    pub source_hostname: String,

    #[serde(rename = "@uuid")]
    pub uuid: Uuid,
}

/// Per-source counters as reported by the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFileInfo {
    pub lines_read: u64,
    pub errors_count: u64,
}

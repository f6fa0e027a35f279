//! Line formatting
//!
//! Wraps a raw line in the JSON envelope and stamps it with id, time and host.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use contracts::{LineMessage, Record};
use uuid::Uuid;

use crate::error::{IngestionError, Result};

/// Turns raw lines into `Record`s
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    hostname: Arc<str>,
}

impl RecordFormatter {
    pub fn new(hostname: impl Into<Arc<str>>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Use the machine hostname, falling back to `localhost`.
    pub fn from_system() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self::new(hostname)
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Format one line read from `source`.
    ///
    /// # Errors
    /// `FormatFailed` when the line is not valid UTF-8 or cannot be serialized.
    pub fn format(&self, source: &Arc<str>, line: &[u8]) -> Result<Record> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = std::str::from_utf8(line).map_err(|e| IngestionError::FormatFailed {
            source_name: source.to_string(),
            message: e.to_string(),
        })?;

        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let message = LineMessage {
            message: text.to_string(),
            timestamp,
            source_filename: source.to_string(),
            source_hostname: self.hostname.to_string(),
            uuid: id,
        };

        let payload = serde_json::to_vec(&message).map_err(|e| IngestionError::FormatFailed {
            source_name: source.to_string(),
            message: e.to_string(),
        })?;

        Ok(Record {
            id,
            timestamp,
            source: source.clone(),
            hostname: self.hostname.clone(),
            payload: Bytes::from(payload),
        })
    }
}

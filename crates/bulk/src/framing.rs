//! Bulk framing
//!
//! Each record becomes two newline-terminated JSON lines: an index action
//! header naming the daily index, then the record payload.

use chrono::{DateTime, Utc};
use contracts::Record;
use serde::{Deserialize, Serialize};

use crate::error::BulkError;

pub const INDEX_PREFIX: &str = "logstash-";
pub const DOCUMENT_TYPE: &str = "message";

/// `{"index":{"_index":...,"_type":...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAction {
    pub index: IndexTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTarget {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
}

impl IndexAction {
    pub fn for_record(record: &Record) -> Self {
        Self {
            index: IndexTarget {
                index: index_name(&record.timestamp),
                doc_type: DOCUMENT_TYPE.to_string(),
            },
        }
    }
}

/// Daily index for a record produced at `timestamp`
pub fn index_name(timestamp: &DateTime<Utc>) -> String {
    format!("{}{}", INDEX_PREFIX, timestamp.format("%Y-%m-%d"))
}

/// Append the header + payload frame for `record` to `buf`.
///
/// On error nothing is appended.
pub fn write_frame(buf: &mut Vec<u8>, record: &Record) -> Result<(), BulkError> {
    if record.payload.contains(&b'\n') {
        return Err(BulkError::InvalidPayload {
            reason: "payload contains a newline".to_string(),
        });
    }

    let start = buf.len();
    if let Err(e) = serde_json::to_writer(&mut *buf, &IndexAction::for_record(record)) {
        buf.truncate(start);
        return Err(e.into());
    }
    buf.push(b'\n');
    buf.extend_from_slice(&record.payload);
    buf.push(b'\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(ts: &str, payload: &'static str) -> Record {
        let ts = DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc);
        Record::new("test.log", "host", payload).with_timestamp(ts)
    }

    #[test]
    fn test_frame_layout() {
        let record = record_at("2024-03-01T23:59:59Z", r#"{"@message":"hi"}"#);
        let mut buf = Vec::new();
        write_frame(&mut buf, &record).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "{\"index\":{\"_index\":\"logstash-2024-03-01\",\"_type\":\"message\"}}\n{\"@message\":\"hi\"}\n"
        );
    }

    #[test]
    fn test_index_uses_utc_date() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T23:30:00-05:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(index_name(&ts), "logstash-2024-03-02");
    }

    #[test]
    fn test_newline_in_payload_rejected() {
        let record = record_at("2024-03-01T00:00:00Z", "two\nlines");
        let mut buf = b"existing".to_vec();
        let err = write_frame(&mut buf, &record).unwrap_err();
        assert!(matches!(err, BulkError::InvalidPayload { .. }));
        assert_eq!(buf, b"existing");
    }
}

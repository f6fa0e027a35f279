//! Bulk datagram parsing
//!
//! The inverse of framing: used by the `receive` command and by tests that
//! sit on the far side of the transport.

use serde::Serialize;
use serde_json::Value;

use crate::error::BulkError;
use crate::framing::IndexAction;

/// One header+payload pair recovered from a datagram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkDocument {
    pub index: String,
    pub doc_type: String,
    pub document: Value,
}

/// Parse a datagram into its documents.
///
/// Every frame must be a complete pair of lines: an index action header and
/// a JSON payload. A trailing empty line is allowed; anything else is an
/// error naming the 1-based line.
pub fn parse_datagram(datagram: &[u8]) -> Result<Vec<BulkDocument>, BulkError> {
    let text = std::str::from_utf8(datagram).map_err(|e| BulkError::Parse {
        line: 0,
        message: e.to_string(),
    })?;

    let mut lines = text.strip_suffix('\n').unwrap_or(text).split('\n').enumerate();
    let mut documents = Vec::new();

    if text.is_empty() {
        return Ok(documents);
    }

    while let Some((n, header)) = lines.next() {
        let action: IndexAction = serde_json::from_str(header).map_err(|e| BulkError::Parse {
            line: n + 1,
            message: format!("bad index action: {e}"),
        })?;

        let Some((m, payload)) = lines.next() else {
            return Err(BulkError::Parse {
                line: n + 2,
                message: "index action without a document".to_string(),
            });
        };
        let document = serde_json::from_str(payload).map_err(|e| BulkError::Parse {
            line: m + 1,
            message: format!("bad document: {e}"),
        })?;

        documents.push(BulkDocument {
            index: action.index.index,
            doc_type: action.index.doc_type,
            document,
        });
    }

    Ok(documents)
}

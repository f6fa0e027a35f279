//! Bulk error types

use std::io;

use thiserror::Error;

/// Datagram transport failure. Reported per attempt, never retried here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve '{endpoint}': {message}")]
    Resolve { endpoint: String, message: String },

    #[error("failed to connect to '{endpoint}': {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to '{endpoint}': {source}")]
    Write {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("short write to '{endpoint}': sent {sent} of {len} bytes")]
    ShortWrite {
        endpoint: String,
        sent: usize,
        len: usize,
    },
}

#[derive(Debug, Error)]
pub enum BulkError {
    /// Frame would not fit in a single datagram
    #[error("record frame of {len} bytes exceeds datagram limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// Payload would break newline-delimited framing
    #[error("payload cannot be framed: {reason}")]
    InvalidPayload { reason: String },

    #[error("failed to encode action header: {0}")]
    Encode(#[from] serde_json::Error),

    /// Malformed bulk datagram
    #[error("bulk parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("committer stopped")]
    CommitterStopped,

    #[error("bulk task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] contracts::ContractError),
}

impl BulkError {
    /// Short label used for the rejected-records metric
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FrameTooLarge { .. } => "oversized",
            Self::InvalidPayload { .. } => "unframeable",
            Self::Encode(_) => "encode",
            Self::Parse { .. } => "parse",
            Self::CommitterStopped | Self::Task(_) => "stopped",
            Self::Transport(_) => "transport",
            Self::Config(_) => "config",
        }
    }
}

//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source could not be opened at registration time
    #[error("failed to open source '{source_name}': {message}")]
    OpenFailed { source_name: String, message: String },

    /// Source read failed; the registration is over
    #[error("read failed for source '{source_name}': {message}")]
    ReadFailed { source_name: String, message: String },

    /// Line could not be placed in the record envelope
    #[error("failed to format line from '{source_name}': {message}")]
    FormatFailed { source_name: String, message: String },

    /// Nobody is consuming records anymore
    #[error("delivery target closed for source '{source_name}'")]
    TargetClosed { source_name: String },

    #[error("source '{source_name}' is already registered")]
    AlreadyRegistered { source_name: String },

    /// Tailing task panicked or was aborted
    #[error("tail task for source '{source_name}' ended abnormally: {message}")]
    TaskFailed { source_name: String, message: String },
}

impl IngestionError {
    pub fn source_name(&self) -> &str {
        match self {
            Self::OpenFailed { source_name, .. }
            | Self::ReadFailed { source_name, .. }
            | Self::FormatFailed { source_name, .. }
            | Self::TargetClosed { source_name }
            | Self::AlreadyRegistered { source_name }
            | Self::TaskFailed { source_name, .. } => source_name,
        }
    }
}

impl From<ContractError> for IngestionError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::SourceOpen {
                source_name,
                message,
            } => Self::OpenFailed {
                source_name,
                message,
            },
            ContractError::SourceRead {
                source_name,
                message,
            } => Self::ReadFailed {
                source_name,
                message,
            },
            other => Self::ReadFailed {
                source_name: String::new(),
                message: other.to_string(),
            },
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;

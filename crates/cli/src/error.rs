//! Error types for CLI operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A tracked source stopped with an error
    #[error("source '{source_name}' failed: {message}")]
    SourceFailed { source_name: String, message: String },

    /// A pipeline stage failed while draining
    #[error("error during shutdown of {stage}: {message}")]
    Shutdown { stage: &'static str, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn source_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn shutdown(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Shutdown {
            stage,
            message: message.into(),
        }
    }
}

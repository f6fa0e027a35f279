//! Dispatcher error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Builder finished without any sink
    #[error("dispatcher has no sinks")]
    NoSinks,

    /// Two sinks registered under one name
    #[error("duplicate sink name '{name}'")]
    DuplicateSink { name: String },

    /// Sink worker ended abnormally
    #[error("sink '{name}' worker failed: {message}")]
    Worker { name: String, message: String },

    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    pub fn duplicate_sink(name: impl Into<String>) -> Self {
        Self::DuplicateSink { name: name.into() }
    }

    pub fn worker(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            name: name.into(),
            message: message.into(),
        }
    }
}

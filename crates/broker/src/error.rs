//! Broker error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker loop has exited
    #[error("broker is not running")]
    Stopped,

    /// Publish backlog full; the record was dropped and counted
    #[error("broker publish backlog full, record dropped")]
    Backlogged,
}

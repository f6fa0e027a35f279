//! # Broker
//!
//! Broadcast broker for live record fan-out.
//!
//! Responsibilities:
//! - Own the subscriber set inside a single event loop (no shared map, no locks)
//! - Deliver every published record to the subscribers connected at publish time
//! - Bound each subscriber's queue; on overflow drop its oldest record and count it
//! - Bound the publish backlog; when the loop falls that far behind, refuse and count
//! - Handle join/leave, including implicit leave when a subscription is dropped
//!
//! ```ignore
//! let (handle, task) = BrokerService::spawn(256);
//! let sub = handle.subscribe().await;
//! handle.publish(record)?;
//! while let Some(record) = sub.recv().await { /* ... */ }
//! ```

mod error;
mod handle;
mod service;
mod subscription;

pub use error::BrokerError;
pub use handle::BrokerHandle;
pub use service::{BrokerService, BrokerStats, DEFAULT_PUBLISH_BACKLOG};
pub use subscription::{SubscriberId, Subscription};

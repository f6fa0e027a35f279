//! # Contracts
//!
//! Interface contracts shared by every crate in the workspace: data model,
//! configuration types, error taxonomy, and the source/sink traits.
//! Business crates depend on this crate, never the other way around.
//!
//! ## Time Model
//! - Records are stamped with the UTC wall-clock instant the line was read
//! - The bulk index name is derived from that timestamp's UTC date

mod error;
mod record;
mod service_config;
mod sink;
mod source;

pub use error::*;
pub use record::*;
pub use service_config::*;
pub use sink::*;
pub use source::*;

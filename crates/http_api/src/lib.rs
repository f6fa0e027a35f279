//! HTTP edge
//!
//! Two endpoints: a live `text/event-stream` feed backed by one broker
//! subscription per client, and a JSON status document.
//!
//! ```ignore
//! let state = AppState::new(broker, registry);
//! let app = build_router(state, &config.server);
//! serve(&config.server.listen, app, shutdown_signal).await?;
//! ```

mod error;
pub mod routes;
mod server;
mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use routes::status::StatusResponse;
pub use server::{bind, serve};
pub use state::AppState;

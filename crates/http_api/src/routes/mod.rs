//! Route table

pub mod realtime;
pub mod status;

use axum::routing::get;
use axum::Router;
use contracts::ServerConfig;

use crate::state::AppState;

/// Router with the live feed and status document at their configured paths
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route(&config.realtime_path, get(realtime::stream))
        .route(&config.status_path, get(status::status))
        .with_state(state)
}

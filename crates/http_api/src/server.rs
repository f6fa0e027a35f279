//! Listener and serve loop

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::ApiError;

/// Bind the listener up front so bind failures surface before the pipeline starts.
pub async fn bind(addr: &str) -> Result<TcpListener, ApiError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::bind(addr, e))?;
    if let Ok(local) = listener.local_addr() {
        info!(addr = %local, "http listener bound");
    }
    Ok(listener)
}

/// Serve until `shutdown` resolves.
///
/// Open live feeds hold the graceful shutdown open until their subscription
/// ends, so stop the broker before (or concurrently with) resolving `shutdown`.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ApiError::Serve)?;
    info!("http server stopped");
    Ok(())
}

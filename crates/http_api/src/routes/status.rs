//! Status document

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use broker::BrokerStats;
use bulk::BulkMetricsSnapshot;
use contracts::OpenFileInfo;
use dispatcher::MetricsSnapshot;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Registered sources and their `{linesRead, errorsCount}`
    pub sources: BTreeMap<String, OpenFileInfo>,
    /// Left out once the broker has stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime: Option<BrokerStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk: Option<BulkMetricsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sinks: Option<BTreeMap<String, MetricsSnapshot>>,
    pub uptime_secs: u64,
}

/// Source counters do not depend on the broker, so they are served even
/// after it has stopped.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let realtime = state.broker.stats().await.ok();

    Json(StatusResponse {
        sources: state.registry.snapshot(),
        realtime,
        bulk: state.bulk.as_ref().map(|m| m.snapshot()),
        sinks: state.sinks.as_ref().map(|s| s.snapshot()),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

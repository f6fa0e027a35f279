//! Shared handler state

use std::sync::Arc;
use std::time::Instant;

use broker::BrokerHandle;
use bulk::BulkMetrics;
use dispatcher::SinkMetricsSet;
use ingestion::CounterRegistry;

#[derive(Clone)]
pub struct AppState {
    pub broker: BrokerHandle,
    pub registry: CounterRegistry,
    /// Absent when no bulk pipeline is attached
    pub bulk: Option<Arc<BulkMetrics>>,
    pub sinks: Option<SinkMetricsSet>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(broker: BrokerHandle, registry: CounterRegistry) -> Self {
        Self {
            broker,
            registry,
            bulk: None,
            sinks: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_bulk(mut self, metrics: Arc<BulkMetrics>) -> Self {
        self.bulk = Some(metrics);
        self
    }

    pub fn with_sinks(mut self, sinks: SinkMetricsSet) -> Self {
        self.sinks = Some(sinks);
        self
    }
}

//! Pipeline orchestrator - wires sources, dispatcher, broker, bulk and HTTP.
//!
//! Start order puts every fatal check first (listener bind, source open),
//! then spawns the long-running stages. Stop order follows the data:
//! sources, dispatcher, bulk, broker, HTTP.

use std::future::{pending, Future};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use broker::BrokerService;
use bulk::BulkPipeline;
use contracts::ServiceConfig;
use dispatcher::DispatcherBuilder;
use http_api::{build_router, AppState};
use ingestion::{IngestionPipeline, SourceExit};
use tokio::sync::oneshot;
use tracing::{error, info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub service: ServiceConfig,

    /// Stop on its own after this long (None = until shutdown)
    pub timeout: Option<Duration>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout passes, or a source fails.
    ///
    /// Startup failures are returned as errors. A source failing while
    /// running still drains every stage; the failure is carried in the
    /// returned stats.
    #[instrument(name = "pipeline_run", skip_all)]
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let service = &self.config.service;

        // Fatal checks first
        let listener = http_api::bind(&service.server.listen)
            .await
            .context("failed to bind HTTP listener")?;

        let mut ingestion = IngestionPipeline::new(service.dispatch.queue_capacity);
        for source in &service.sources {
            ingestion
                .register_file(source.source_name(), &source.path)
                .await
                .with_context(|| format!("failed to open source '{}'", source.source_name()))?;
        }
        let registry = ingestion.registry();
        let input = ingestion
            .take_receiver()
            .ok_or_else(|| anyhow!("ingestion receiver already taken"))?;

        // Long-running stages
        let (broker, broker_task) = BrokerService::spawn(service.broker.subscriber_queue_capacity);
        let bulk = BulkPipeline::from_config(&service.bulk).context("failed to start bulk pipeline")?;

        let dispatcher = DispatcherBuilder::standard(input, &service.dispatch, broker.clone(), bulk.sender())
            .build()
            .await
            .context("failed to build dispatcher")?;
        let sink_metrics = dispatcher.sink_metrics();
        let dispatcher_task = dispatcher.spawn();

        let state = AppState::new(broker.clone(), registry.clone())
            .with_bulk(bulk.metrics())
            .with_sinks(sink_metrics);
        let app = build_router(state, &service.server);
        let (http_stop, http_stopped) = oneshot::channel::<()>();
        let http_task = tokio::spawn(http_api::serve(listener, app, async move {
            let _ = http_stopped.await;
        }));

        info!(
            sources = ingestion.source_count(),
            listen = %service.server.listen,
            realtime = %service.server.realtime_path,
            status = %service.server.status_path,
            bulk = %service.bulk.endpoint,
            "pipeline running"
        );

        let failure = self.wait(&mut ingestion, shutdown).await;

        // Drain in data order
        info!("stopping pipeline");
        let mut stats = PipelineStats {
            sources: registry.snapshot(),
            failure,
            ..Default::default()
        };
        let mut shutdown_errors = Vec::new();

        ingestion.stop_all().await;

        match dispatcher_task.await {
            Ok(Ok(report)) => {
                stats.records_dispatched = report.records;
                stats.sinks = report.sinks;
            }
            Ok(Err(e)) => shutdown_errors.push(CliError::shutdown("dispatcher", e.to_string())),
            Err(e) => shutdown_errors.push(CliError::shutdown("dispatcher", e.to_string())),
        }

        let bulk_metrics = bulk.metrics();
        match bulk.shutdown().await {
            Ok(summary) => stats.bulk = Some(summary),
            Err(e) => shutdown_errors.push(CliError::shutdown("bulk", e.to_string())),
        }
        stats.bulk_counters = bulk_metrics.snapshot();

        if broker.shutdown().is_err() {
            warn!("broker already stopped");
        }
        match broker_task.await {
            Ok(broker_stats) => stats.broker = broker_stats,
            Err(e) => shutdown_errors.push(CliError::shutdown("broker", e.to_string())),
        }

        let _ = http_stop.send(());
        match http_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => shutdown_errors.push(CliError::shutdown("http", e.to_string())),
            Err(e) => shutdown_errors.push(CliError::shutdown("http", e.to_string())),
        }

        for e in &shutdown_errors {
            error!(error = %e, "shutdown step failed");
        }
        stats.duration = start_time.elapsed();

        match shutdown_errors.into_iter().next() {
            Some(e) => Err(e.into()),
            None => Ok(stats),
        }
    }

    async fn wait<F>(&self, ingestion: &mut IngestionPipeline, shutdown: F) -> Option<CliError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let timeout = async {
            match self.config.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => pending().await,
            }
        };
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("shutdown signal received");
                    return None;
                }
                _ = &mut timeout => {
                    info!("run timeout reached");
                    return None;
                }
                exit = ingestion.next_exit() => match exit {
                    Some(SourceExit { source_name, result: Ok(lines) }) => {
                        info!(source = %source_name, lines, "source ended");
                    }
                    Some(SourceExit { source_name, result: Err(e) }) => {
                        error!(source = %source_name, error = %e, "source failed");
                        return Some(CliError::source_failed(source_name, e.to_string()));
                    }
                    None => {
                        info!("no sources left");
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceConfig;

    fn config(sources: Vec<SourceConfig>) -> PipelineConfig {
        let mut service: ServiceConfig = config_loader::ConfigLoader::load_from_str(
            "[[sources]]\npath = \"placeholder.log\"\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        service.sources = sources;
        service.server.listen = "127.0.0.1:0".to_string();
        service.bulk.endpoint = "udp://127.0.0.1:9".to_string();
        PipelineConfig {
            service,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.log");
        let pipeline = Pipeline::new(config(vec![SourceConfig::new(missing.display().to_string())]));

        let err = pipeline.run(pending()).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to open source"), "{err:#}");
    }

    #[tokio::test]
    async fn test_bad_listen_address_fails() {
        let mut config = config(Vec::new());
        config.service.server.listen = "not-an-address".to_string();

        let err = Pipeline::new(config).run(pending()).await.unwrap_err();
        assert!(format!("{err:#}").contains("bind"), "{err:#}");
    }
}

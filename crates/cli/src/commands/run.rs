//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use tracing::info;

use super::{load_config, shutdown_signal};
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "loading configuration");
    let mut service = load_config(&args.config)?;

    if let Some(ref listen) = args.listen {
        info!(listen = %listen, "overriding listen address from CLI");
        service.server.listen = listen.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        info!(endpoint = %endpoint, "overriding bulk endpoint from CLI");
        service.bulk.endpoint = endpoint.clone();
    }
    if args.listen.is_some() || args.endpoint.is_some() {
        config_loader::ConfigLoader::validate(&service).context("invalid CLI override")?;
    }

    info!(
        sources = service.sources.len(),
        listen = %service.server.listen,
        bulk = %service.bulk.endpoint,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry run - configuration is valid, exiting");
        print_config_summary(&service);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let pipeline = Pipeline::new(PipelineConfig {
        service,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
    });

    let mut stats = pipeline.run(shutdown_signal()).await.context("pipeline failed")?;
    info!(
        lines = stats.lines_read(),
        records = stats.records_dispatched,
        duration_secs = stats.duration.as_secs_f64(),
        "pipeline stopped"
    );
    stats.print_summary();

    if let Some(failure) = stats.failure.take() {
        return Err(failure.into());
    }

    info!("logpush finished");
    Ok(())
}

fn print_config_summary(service: &ServiceConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Sources ({}):", service.sources.len());
    for source in &service.sources {
        println!("  - {} ({})", source.source_name(), source.path);
    }
    println!("\nHTTP: {}", service.server.listen);
    println!("  live feed: {}", service.server.realtime_path);
    println!("  status:    {}", service.server.status_path);
    println!("\nBulk: {}", service.bulk.endpoint);
    println!(
        "  flush at {} records, {} bytes or {} ms",
        service.bulk.max_records, service.bulk.max_bytes, service.bulk.flush_interval_ms
    );
    println!();
}

//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    sources: Vec<SourceInfo<'a>>,
    server: &'a contracts::ServerConfig,
    broker: &'a contracts::BrokerConfig,
    bulk: &'a contracts::BulkConfig,
    dispatch: &'a contracts::DispatchConfig,
}

#[derive(Serialize)]
struct SourceInfo<'a> {
    name: &'a str,
    path: &'a str,
}

pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "loading configuration info");

    let service = load_config(&args.config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&service))
            .context("failed to serialize config info")?;
        println!("{}", json);
    } else if args.effective {
        print!("{}", config_loader::ConfigLoader::to_toml(&service)?);
    } else {
        print_config_info(&service);
    }

    Ok(())
}

fn build_config_info(service: &ServiceConfig) -> ConfigInfo<'_> {
    ConfigInfo {
        version: format!("{:?}", service.version),
        sources: service
            .sources
            .iter()
            .map(|s| SourceInfo {
                name: s.source_name(),
                path: &s.path,
            })
            .collect(),
        server: &service.server,
        broker: &service.broker,
        bulk: &service.bulk,
        dispatch: &service.dispatch,
    }
}

fn print_config_info(service: &ServiceConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    logpush Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Sources ({})", service.sources.len());
    for (i, source) in service.sources.iter().enumerate() {
        let prefix = if i == service.sources.len() - 1 { "└─" } else { "├─" };
        println!("   {} {} ({})", prefix, source.source_name(), source.path);
    }

    println!("\nHTTP");
    println!("   ├─ Listen: {}", service.server.listen);
    println!("   ├─ Live feed: {}", service.server.realtime_path);
    println!("   └─ Status: {}", service.server.status_path);

    println!("\nRealtime");
    println!(
        "   └─ Subscriber queue: {} records (oldest dropped when full)",
        service.broker.subscriber_queue_capacity
    );

    let bulk = &service.bulk;
    println!("\nBulk");
    println!("   ├─ Endpoint: {}", bulk.endpoint);
    println!("   ├─ Flush: {} records / {} bytes / {} ms", bulk.max_records, bulk.max_bytes, bulk.flush_interval_ms);
    println!("   ├─ Datagram limit: {} bytes", bulk.max_datagram_bytes);
    println!("   └─ Input queue: {} records", bulk.queue_capacity);

    println!("\nDispatch");
    println!("   ├─ Sink queue: {} records (newest dropped when full)", service.dispatch.queue_capacity);
    println!("   └─ Log records: {}", service.dispatch.log_records);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_json_shape() {
        let service = config_loader::ConfigLoader::load_from_str(
            "[[sources]]\nname = \"app\"\npath = \"/var/log/app.log\"\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let value = serde_json::to_value(build_config_info(&service)).unwrap();
        assert_eq!(value["sources"][0]["name"], "app");
        assert_eq!(value["bulk"]["max_records"], 100);
        assert_eq!(value["server"]["realtime_path"], "/v0/logs/all/realtime");
    }
}

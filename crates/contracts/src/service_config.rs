//! ServiceConfig - Config Loader output
//!
//! Describes the whole service: tracked sources, HTTP edge, broker queues,
//! bulk shipping policy and dispatcher isolation queues.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    /// Tracked files
    #[validate(length(min = 1, message = "at least one source is required"))]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub bulk: BulkConfig,

    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,
}

/// HTTP edge: live feed and status endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// host:port to bind
    #[serde(default = "default_listen")]
    #[validate(length(min = 1))]
    pub listen: String,

    #[serde(default = "default_realtime_path")]
    pub realtime_path: String,

    #[serde(default = "default_status_path")]
    pub status_path: String,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_realtime_path() -> String {
    "/v0/logs/all/realtime".to_string()
}

fn default_status_path() -> String {
    "/v0/logs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            realtime_path: default_realtime_path(),
            status_path: default_status_path(),
        }
    }
}

/// One tracked file
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// Registration name, defaults to the path
    #[serde(default)]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "source path must not be empty"))]
    pub path: String,
}

impl SourceConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: path.into(),
        }
    }

    /// Name the source is registered and reported under.
    pub fn source_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

/// Broadcast broker settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Per-subscriber queue capacity; the oldest record is dropped on overflow
    #[serde(default = "default_subscriber_queue_capacity")]
    #[validate(range(min = 1))]
    pub subscriber_queue_capacity: usize,
}

fn default_subscriber_queue_capacity() -> usize {
    256
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
        }
    }
}

/// Bulk shipping settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkConfig {
    /// Remote indexer address, `udp://host:port`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Forced flush interval for a non-empty batch
    #[serde(default = "default_flush_interval_ms")]
    #[validate(range(min = 1))]
    pub flush_interval_ms: u64,

    #[serde(default = "default_max_records")]
    #[validate(range(min = 1))]
    pub max_records: usize,

    #[serde(default = "default_max_bytes")]
    #[validate(range(min = 1))]
    pub max_bytes: usize,

    /// Hard ceiling for a single datagram
    #[serde(default = "default_max_datagram_bytes")]
    #[validate(range(min = 1, max = 65507))]
    pub max_datagram_bytes: usize,

    /// Records queued between the dispatcher and the batch assembler
    #[serde(default = "default_bulk_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
}

fn default_endpoint() -> String {
    "udp://localhost:9700".to_string()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_max_records() -> usize {
    100
}

fn default_max_bytes() -> usize {
    60_000
}

fn default_max_datagram_bytes() -> usize {
    65_000
}

fn default_bulk_queue_capacity() -> usize {
    1024
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            flush_interval_ms: default_flush_interval_ms(),
            max_records: default_max_records(),
            max_bytes: default_max_bytes(),
            max_datagram_bytes: default_max_datagram_bytes(),
            queue_capacity: default_bulk_queue_capacity(),
        }
    }
}

impl BulkConfig {
    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            max_records: self.max_records,
            max_bytes: self.max_bytes,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Per-sink isolation queue capacity
    #[serde(default = "default_dispatch_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Echo every record to the log at debug level
    #[serde(default)]
    pub log_records: bool,
}

fn default_dispatch_queue_capacity() -> usize {
    1024
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_dispatch_queue_capacity(),
            log_records: false,
        }
    }
}

/// Flush triggers for the batch assembler. Whichever is reached first fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub max_records: usize,
    pub max_bytes: usize,
    pub flush_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        BulkConfig::default().flush_policy()
    }
}

/// Parsed `udp://host:port` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpEndpoint {
    pub host: String,
    pub port: u16,
}

impl UdpEndpoint {
    /// `host:port` form accepted by socket address lookup
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for UdpEndpoint {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| ContractError::invalid_endpoint(s, "missing scheme"))?;

        if scheme != "udp" {
            return Err(ContractError::invalid_endpoint(
                s,
                format!("unsupported scheme '{}', only udp is supported", scheme),
            ));
        }

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| ContractError::invalid_endpoint(s, "missing port"))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ContractError::invalid_endpoint(s, "missing host"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| ContractError::invalid_endpoint(s, format!("bad port: {}", e)))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for UdpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "udp://{}", self.authority())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let json = r#"{ "sources": [ { "path": "test.log" } ] }"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.server.realtime_path, "/v0/logs/all/realtime");
        assert_eq!(config.sources[0].source_name(), "test.log");
        assert_eq!(config.bulk.endpoint, "udp://localhost:9700");
        assert_eq!(config.bulk.max_datagram_bytes, 65_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flush_policy_from_bulk_config() {
        let bulk = BulkConfig {
            flush_interval_ms: 5000,
            max_records: 5,
            max_bytes: 65_000,
            ..Default::default()
        };
        let policy = bulk.flush_policy();
        assert_eq!(policy.max_records, 5);
        assert_eq!(policy.flush_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_derive_rules_reject_zero_thresholds() {
        let mut config: ServiceConfig =
            serde_json::from_str(r#"{ "sources": [ { "path": "a.log" } ] }"#).unwrap();
        config.bulk.max_records = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_sources_rejected() {
        let config: ServiceConfig = serde_json::from_str(r#"{ "sources": [] }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_udp_endpoint() {
        let ep: UdpEndpoint = "udp://localhost:9700".parse().unwrap();
        assert_eq!(ep.host, "localhost");
        assert_eq!(ep.port, 9700);
        assert_eq!(ep.authority(), "localhost:9700");
        assert_eq!(ep.to_string(), "udp://localhost:9700");

        let v6: UdpEndpoint = "udp://[::1]:9700".parse().unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.authority(), "[::1]:9700");
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        assert!("tcp://localhost:9700".parse::<UdpEndpoint>().is_err());
        assert!("localhost:9700".parse::<UdpEndpoint>().is_err());
        assert!("udp://localhost".parse::<UdpEndpoint>().is_err());
        assert!("udp://:9700".parse::<UdpEndpoint>().is_err());
        assert!("udp://host:notaport".parse::<UdpEndpoint>().is_err());
    }
}

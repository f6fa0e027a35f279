//! # Config Loader
//!
//! Reads `logpush.toml` (or its JSON equivalent) into a validated
//! `ServiceConfig`. Every section is optional except `sources`; missing
//! fields take the service defaults.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("logpush.toml")).unwrap();
//! println!("Endpoint: {}", config.bulk.endpoint);
//! ```

mod parser;
mod validator;

pub use contracts::ServiceConfig;
pub use parser::ConfigFormat;

use std::path::Path;

use contracts::ContractError;

/// Entry point for reading a logpush configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read and validate a config file; `.toml` or `.json` picks the parser.
    ///
    /// # Errors
    /// An unreadable file, an unknown extension, a parse error or a failed
    /// validation rule.
    pub fn load_from_path(path: &Path) -> Result<ServiceConfig, ContractError> {
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ConfigFormat::from_extension(ext)
                .ok_or_else(|| ContractError::config_parse(format!("unsupported config format: .{ext}")))?,
            None => {
                return Err(ContractError::config_parse(format!(
                    "{} has no extension, expected .toml or .json",
                    path.display()
                )))
            }
        };
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse `content` as `format`, then validate.
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<ServiceConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Re-check a config that was changed after loading, e.g. by CLI flags.
    pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Effective configuration as TOML, defaults filled in.
    pub fn to_toml(config: &ServiceConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config).map_err(|e| ContractError::config_parse(format!("cannot render TOML: {e}")))
    }

    pub fn to_json(config: &ServiceConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config).map_err(|e| ContractError::config_parse(format!("cannot render JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const APP_TOML: &str = r#"
[[sources]]
name = "app"
path = "/var/log/app.log"

[bulk]
endpoint = "udp://localhost:9700"
flush_interval_ms = 5000
max_records = 5
max_bytes = 65000
"#;

    #[test]
    fn test_sections_default_when_omitted() {
        let config = ConfigLoader::load_from_str(APP_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(config.sources[0].source_name(), "app");
        assert_eq!(config.bulk.max_records, 5);
        assert_eq!(config.broker.subscriber_queue_capacity, 256);
    }

    #[test]
    fn test_effective_toml_reloads() {
        let config = ConfigLoader::load_from_str(APP_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let again = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.sources[0].path, again.sources[0].path);
        assert_eq!(config.bulk.flush_interval_ms, again.bulk.flush_interval_ms);
    }

    #[test]
    fn test_json_from_toml() {
        let config = ConfigLoader::load_from_str(APP_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.bulk.endpoint, again.bulk.endpoint);
    }

    #[test]
    fn test_non_udp_endpoint_rejected() {
        let content = r#"
[[sources]]
path = "a.log"

[bulk]
endpoint = "tcp://localhost:9700"
"#;
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("bulk.endpoint"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(APP_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_load_from_path_requires_extension() {
        let file = tempfile::Builder::new().suffix("").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("expected .toml or .json"));
    }

    #[test]
    fn test_load_from_path_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}

//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use contracts::ServiceConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_count: usize,
    listen: String,
    bulk_endpoint: String,
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "validating configuration");

    let result = validate_config(&args.config);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("configuration validation failed")
    }
}

fn validate_config(path: &Path) -> ValidationResult {
    let config_path = path.display().to_string();

    if !path.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("file not found: {}", path.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(path) {
        Ok(service) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&service),
            summary: Some(ConfigSummary {
                version: format!("{:?}", service.version),
                source_count: service.sources.len(),
                listen: service.server.listen.clone(),
                bulk_endpoint: service.bulk.endpoint.clone(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Non-fatal issues that would still hurt at run time
fn collect_warnings(service: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for source in &service.sources {
        if !Path::new(&source.path).is_file() {
            warnings.push(format!(
                "source '{}' does not exist yet ({}); `run` will fail to open it",
                source.source_name(),
                source.path
            ));
        }
    }

    if service.bulk.max_records > 1 && service.bulk.max_bytes < 1024 {
        warnings.push(format!(
            "bulk.max_bytes = {} is small; most batches will flush on size",
            service.bulk.max_bytes
        ));
    }

    if service.bulk.queue_capacity < service.bulk.max_records {
        warnings.push(format!(
            "bulk.queue_capacity ({}) is below bulk.max_records ({})",
            service.bulk.queue_capacity, service.bulk.max_records
        ));
    }

    if service.dispatch.log_records {
        warnings.push("dispatch.log_records echoes every record at debug level".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Sources: {}", summary.source_count);
            println!("  Listen: {}", summary.listen);
            println!("  Bulk endpoint: {}", summary.bulk_endpoint);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("logpush.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_valid_config_with_missing_source_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[[sources]]\npath = \"/nonexistent/app.log\"\n");

        let result = validate_config(&path);
        assert!(result.valid, "{:?}", result.error);
        assert_eq!(result.summary.as_ref().unwrap().source_count, 1);
        assert!(result.warnings.iter().any(|w| w.contains("does not exist")));
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[[sources]]\npath = \"app.log\"\n\n[bulk]\nmax_bytes = 70000\n",
        );

        let result = validate_config(&path);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(Path::new("/nonexistent/logpush.toml"));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }
}

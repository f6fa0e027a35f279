//! Configuration validation
//!
//! Rules:
//! - field-level rules declared on the config types (non-zero thresholds,
//!   at least one source, datagram ceiling)
//! - source names unique
//! - `max_bytes <= max_datagram_bytes`
//! - bulk endpoint is `udp://host:port`
//! - listen address is `host:port`; HTTP paths absolute and distinct

use std::collections::HashSet;

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{ContractError, ServiceConfig, UdpEndpoint};

/// Validate ServiceConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_field_rules(config)?;
    validate_sources(config)?;
    validate_bulk(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_field_rules(config: &ServiceConfig) -> Result<(), ContractError> {
    if let Err(errors) = config.validate() {
        let (field, message) = first_violation("", &errors)
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        return Err(ContractError::config_validation(field, message));
    }
    Ok(())
}

/// Walk derive-rule errors in field-name order and report the first leaf.
fn first_violation(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    let message = match &err.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' rule", err.code),
                    };
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(&path, inner) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(&format!("{path}[{idx}]"), inner) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn validate_sources(config: &ServiceConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, source) in config.sources.iter().enumerate() {
        if let Err(errors) = source.validate() {
            let prefix = format!("sources[{idx}]");
            let (field, message) = first_violation(&prefix, &errors)
                .unwrap_or_else(|| (prefix.clone(), errors.to_string()));
            return Err(ContractError::config_validation(field, message));
        }

        let name = source.source_name();
        if name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sources[{idx}].name"),
                "source name cannot be empty",
            ));
        }
        if !seen.insert(name) {
            return Err(ContractError::config_validation(
                format!("sources[name={name}]"),
                "duplicate source name",
            ));
        }
    }
    Ok(())
}

fn validate_bulk(config: &ServiceConfig) -> Result<(), ContractError> {
    let bulk = &config.bulk;

    if bulk.max_bytes > bulk.max_datagram_bytes {
        return Err(ContractError::config_validation(
            "bulk.max_bytes / bulk.max_datagram_bytes",
            format!(
                "max_bytes ({}) must be <= max_datagram_bytes ({})",
                bulk.max_bytes, bulk.max_datagram_bytes
            ),
        ));
    }

    bulk.endpoint
        .parse::<UdpEndpoint>()
        .map_err(|e| ContractError::config_validation("bulk.endpoint", e.to_string()))?;

    Ok(())
}

fn validate_server(config: &ServiceConfig) -> Result<(), ContractError> {
    let server = &config.server;

    let valid_listen = server
        .listen
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if !valid_listen {
        return Err(ContractError::config_validation(
            "server.listen",
            format!("expected host:port, got '{}'", server.listen),
        ));
    }

    for (field, path) in [
        ("server.realtime_path", &server.realtime_path),
        ("server.status_path", &server.status_path),
    ] {
        if !path.starts_with('/') {
            return Err(ContractError::config_validation(
                field,
                format!("path must start with '/', got '{}'", path),
            ));
        }
    }

    if server.realtime_path == server.status_path {
        return Err(ContractError::config_validation(
            "server.realtime_path / server.status_path",
            "realtime and status paths must differ",
        ));
    }

    Ok(())
}

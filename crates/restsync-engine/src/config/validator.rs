//! Semantic validation for parsed pipeline configuration values.

use crate::config::types::{AuthConfig, DestinationBackendKind, PipelineConfig};
use crate::config::ConfigurationError;
use crate::registry::{registry_problems, ResourceRegistry};

/// Upper bound on per-page retries.
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// Validate the HTTP client section.
fn validate_client(config: &PipelineConfig, errors: &mut Vec<String>) {
    let client = &config.client;
    match reqwest::Url::parse(&client.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!(
            "client.base_url must use http or https, got '{}'",
            url.scheme()
        )),
        Err(e) => errors.push(format!(
            "client.base_url '{}' is not a valid URL: {e}",
            client.base_url
        )),
    }
    if let AuthConfig::Bearer { token } = &client.auth {
        if token.trim().is_empty() {
            errors.push("client.auth bearer token must not be empty".to_string());
        }
    }
    if client.timeout_seconds == 0 {
        errors.push("client.timeout_seconds must be > 0".to_string());
    }
}

/// Validate execution policy bounds.
fn validate_execution(config: &PipelineConfig, errors: &mut Vec<String>) {
    let exec = &config.execution;
    if exec.max_retries > MAX_RETRIES_LIMIT {
        errors.push(format!(
            "execution.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
            exec.max_retries
        ));
    }
    if exec.parallelism == 0 {
        errors.push("execution.parallelism must be at least 1".to_string());
    }
    if exec.retry_base_delay_ms > exec.retry_max_delay_ms {
        errors.push(
            "execution.retry_base_delay_ms must not exceed retry_max_delay_ms".to_string(),
        );
    }
    if exec.lease_ttl_seconds == 0 {
        errors.push("execution.lease_ttl_seconds must be > 0".to_string());
    }
}

/// Validate a parsed pipeline configuration.
/// Returns `Ok(())` if valid, Err with all validation errors if not.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] listing all validation failures found.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<(), ConfigurationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported pipeline version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.pipeline.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    }

    validate_client(config, &mut errors);

    if config.resources.is_empty() {
        errors.push("Pipeline must define at least one resource".to_string());
    }
    errors.extend(registry_problems(&config.resource_descriptors()));

    if config.destination.backend == DestinationBackendKind::Sqlite
        && config
            .destination
            .connection
            .as_deref()
            .map_or(true, |c| c.trim().is_empty())
    {
        errors.push("Destination backend 'sqlite' requires a connection path".to_string());
    }

    validate_execution(config, &mut errors);

    ConfigurationError::check(errors)
}

/// Validate `config` and build its resource registry.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if validation fails.
pub fn build_registry(config: &PipelineConfig) -> Result<ResourceRegistry, ConfigurationError> {
    validate_pipeline(config)?;
    ResourceRegistry::new(config.resource_descriptors())
}

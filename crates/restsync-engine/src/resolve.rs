//! State backend, destination, and HTTP client creation from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use restsync_state::{SqliteStateBackend, StateBackend};

use crate::config::types::{DestinationBackendKind, PipelineConfig};
use crate::destination::{Destination, MemoryDestination, SqliteDestination};
use crate::http::{HttpClient, ReqwestClient};

/// Default state database path: `$HOME/.restsync/state.db`.
#[must_use]
pub fn default_state_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".restsync").join("state.db")
}

/// Open the pipeline's watermark/run-history store.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or initialized.
pub fn create_state_backend(config: &PipelineConfig) -> Result<Arc<dyn StateBackend>> {
    let backend = if let Some(path) = &config.state.connection {
        SqliteStateBackend::open(Path::new(path)).context("Failed to open state DB")?
    } else {
        SqliteStateBackend::open(&default_state_path())
            .context("Failed to open default state DB")?
    };
    Ok(Arc::new(backend) as Arc<dyn StateBackend>)
}

/// Open the pipeline's destination store.
///
/// # Errors
///
/// Returns an error if a `SQLite` destination has no connection or cannot
/// be opened.
pub fn create_destination(config: &PipelineConfig) -> Result<Arc<dyn Destination>> {
    match config.destination.backend {
        DestinationBackendKind::Sqlite => {
            let path = config
                .destination
                .connection
                .as_deref()
                .context("sqlite destination requires a connection path")?;
            let dest = SqliteDestination::open(Path::new(path))
                .with_context(|| format!("Failed to open destination DB: {path}"))?;
            Ok(Arc::new(dest) as Arc<dyn Destination>)
        }
        DestinationBackendKind::Memory => {
            tracing::warn!(
                pipeline = config.pipeline,
                "In-memory destination: loaded records are discarded at exit"
            );
            Ok(Arc::new(MemoryDestination::new()) as Arc<dyn Destination>)
        }
    }
}

/// Build the source API client.
///
/// # Errors
///
/// Returns an error if the base URL is invalid or the TLS backend fails.
pub fn create_http_client(config: &PipelineConfig) -> Result<Arc<dyn HttpClient>> {
    let client = ReqwestClient::new(&config.client).context("Failed to build HTTP client")?;
    Ok(Arc::new(client) as Arc<dyn HttpClient>)
}

pub(crate) fn check_state_backend(config: &PipelineConfig) -> bool {
    match create_state_backend(config) {
        Ok(_) => {
            tracing::info!("State backend: OK");
            true
        }
        Err(e) => {
            tracing::error!("State backend: FAILED: {e:#}");
            false
        }
    }
}

pub(crate) fn check_destination(config: &PipelineConfig) -> bool {
    match create_destination(config) {
        Ok(_) => {
            tracing::info!("Destination: OK");
            true
        }
        Err(e) => {
            tracing::error!("Destination: FAILED: {e:#}");
            false
        }
    }
}

use std::path::Path;

use anyhow::{Context, Result};

use restsync_engine::config::parser;
use restsync_engine::config::types::PipelineConfig;
use restsync_engine::config::validator;
use restsync_engine::registry::ResourceRegistry;
use restsync_engine::resolve::create_state_backend;
use restsync_engine::watermark::WatermarkStore;
use restsync_state::StateBackend;
use restsync_types::state::PipelineId;

struct Loaded {
    config: PipelineConfig,
    registry: ResourceRegistry,
    backend: std::sync::Arc<dyn StateBackend>,
    store: WatermarkStore,
}

fn load(pipeline_path: &Path) -> Result<Loaded> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    let registry = validator::build_registry(&config)?;
    let backend = create_state_backend(&config)?;
    let store = WatermarkStore::new(backend.clone(), PipelineId::new(config.pipeline.clone()));
    Ok(Loaded {
        config,
        registry,
        backend,
        store,
    })
}

/// Execute `state show`: committed watermarks and the most recent runs.
pub fn show(pipeline_path: &Path, runs: usize) -> Result<()> {
    let loaded = load(pipeline_path)?;
    println!("Pipeline '{}'", loaded.config.pipeline);

    println!("Watermarks:");
    for descriptor in &loaded.registry {
        let Some(cursor) = descriptor.cursor_path() else {
            println!("  {:20} (not incremental)", descriptor.name.as_str());
            continue;
        };
        match loaded.store.committed(&descriptor.name)? {
            Some(state) => println!(
                "  {:20} {cursor} >= {}  (updated {})",
                descriptor.name.as_str(), state.value, state.updated_at
            ),
            None => println!(
                "  {:20} {cursor} >= {}  (initial)",
                descriptor.name.as_str(),
                descriptor.initial_watermark().unwrap_or_default()
            ),
        }
    }

    let history = loaded
        .backend
        .recent_runs(&PipelineId::new(loaded.config.pipeline.clone()), runs)?;
    if history.is_empty() {
        return Ok(());
    }
    println!("Recent runs:");
    for run in history {
        println!(
            "  #{:<5} {:20} {:10} pages={} loaded={} retries={} started={}",
            run.run_id,
            run.resource.as_str(),
            run.status.as_str(),
            run.stats.pages_fetched,
            run.stats.records_loaded,
            run.stats.retries,
            run.started_at,
        );
        if let Some(error) = &run.stats.error_message {
            println!("         {error}");
        }
    }
    Ok(())
}

/// Execute `state set`: overwrite a resource's watermark.
pub fn set(pipeline_path: &Path, resource: &str, value: &str) -> Result<()> {
    let loaded = load(pipeline_path)?;
    let descriptor = loaded
        .registry
        .get(resource)
        .with_context(|| format!("Unknown resource '{resource}'"))?;
    if descriptor.incremental.is_none() {
        anyhow::bail!("Resource '{resource}' is not incremental");
    }
    loaded.store.set(descriptor, value)?;
    println!("Watermark for '{resource}' set to {value}");
    Ok(())
}

/// Execute `state reset`: forget a resource's watermark.
pub fn reset(pipeline_path: &Path, resource: &str) -> Result<()> {
    let loaded = load(pipeline_path)?;
    let descriptor = loaded
        .registry
        .get(resource)
        .with_context(|| format!("Unknown resource '{resource}'"))?;
    if loaded.store.reset(&descriptor.name)? {
        println!("Watermark for '{resource}' cleared");
    } else {
        println!("No watermark stored for '{resource}'");
    }
    Ok(())
}

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use restsync_engine::config::parser;
use restsync_engine::config::validator;
use restsync_engine::orchestrator;
use restsync_engine::{ResourceStatus, RunOutcome, RunReport};

/// Execute the `run` command: parse, validate, and run a pipeline.
pub async fn execute(pipeline_path: &Path, json: bool) -> Result<()> {
    // 1. Parse pipeline YAML
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    // 2. Validate
    validator::validate_pipeline(&config)?;

    tracing::info!(
        pipeline = config.pipeline,
        base_url = config.client.base_url,
        resources = config.resources.len(),
        "Pipeline validated"
    );

    // 3. Run, stopping at the next page boundary on Ctrl-C
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            on_signal.cancel();
        }
    });

    let report = orchestrator::run_pipeline(&config, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    match report.status {
        RunOutcome::Succeeded => Ok(()),
        RunOutcome::Cancelled => anyhow::bail!("Pipeline '{}' was cancelled", report.pipeline),
        RunOutcome::Failed => anyhow::bail!("One or more resources failed"),
    }
}

fn print_report(report: &RunReport) {
    println!(
        "Pipeline '{}' finished in {:.2}s: {}",
        report.pipeline,
        report.duration_secs,
        outcome_label(report.status)
    );
    for r in &report.resources {
        println!("  {:20} {}", format!("{}:", r.resource), status_label(r.status));
        println!("    Pages:           {}", r.pages_fetched);
        println!("    Records loaded:  {}", r.records_loaded);
        println!("    Records changed: {}", r.records_changed);
        if r.retries > 0 {
            println!("    Retries:         {}", r.retries);
        }
        if r.drift_events > 0 {
            println!("    Total drift:     {} page(s)", r.drift_events);
        }
        if let Some(watermark) = &r.final_watermark {
            println!("    Watermark:       {watermark}");
        }
        if let Some(error) = &r.error {
            println!("    Error:           {error}");
        }
    }
}

fn outcome_label(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Succeeded => "succeeded",
        RunOutcome::Failed => "failed",
        RunOutcome::Cancelled => "cancelled",
    }
}

fn status_label(status: ResourceStatus) -> &'static str {
    match status {
        ResourceStatus::Succeeded => "OK",
        ResourceStatus::PartiallySucceeded => "PARTIAL",
        ResourceStatus::Failed => "FAILED",
        ResourceStatus::FailedBeforeStart => "NOT STARTED",
        ResourceStatus::Cancelled => "CANCELLED",
    }
}

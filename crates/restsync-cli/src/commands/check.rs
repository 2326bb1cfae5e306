use std::path::Path;

use anyhow::{Context, Result};

use restsync_engine::config::parser;
use restsync_engine::orchestrator;

/// Execute the `check` command: validate pipeline config and open its backends.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    // 1. Parse pipeline YAML
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    // 2. Validate and open state and destination
    let result = orchestrator::check_pipeline(&config).await?;

    // 3. Report results
    if result.problems.is_empty() {
        println!("Pipeline structure: OK");
        for name in &result.resources {
            println!("  resource: {name}");
        }
    } else {
        println!("Pipeline structure: FAILED");
        for problem in &result.problems {
            println!("  - {problem}");
        }
    }
    println!("{:19} {}", "State backend:", ok_or_failed(result.state_ok));
    println!("{:19} {}", "Destination:", ok_or_failed(result.destination_ok));

    if result.ok() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn ok_or_failed(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAILED"
    }
}

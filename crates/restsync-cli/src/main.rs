mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "restsync",
    version,
    about = "Incremental REST API extraction into a local store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every resource of a pipeline once
    Run {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate pipeline configuration and open its state and destination
    Check {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
    },
    /// Inspect or override stored watermarks
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Show committed watermarks and recent runs
    Show {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        /// Number of recent runs to list
        #[arg(long, default_value_t = 10)]
        runs: usize,
    },
    /// Overwrite a resource's watermark
    Set {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        resource: String,
        value: String,
    },
    /// Forget a resource's watermark so the next run starts from its initial value
    Reset {
        /// Path to pipeline YAML file
        pipeline: PathBuf,
        resource: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { pipeline, json } => commands::run::execute(&pipeline, json).await,
        Commands::Check { pipeline } => commands::check::execute(&pipeline).await,
        Commands::State { action } => match action {
            StateAction::Show { pipeline, runs } => commands::state::show(&pipeline, runs),
            StateAction::Set {
                pipeline,
                resource,
                value,
            } => commands::state::set(&pipeline, &resource, &value),
            StateAction::Reset { pipeline, resource } => {
                commands::state::reset(&pipeline, &resource)
            }
        },
    }
}

//! Paginated incremental extraction and merge-load engine.
//!
//! Resources declared in a pipeline YAML are paged through a REST API by
//! server-reported total count, loaded into a destination per write
//! disposition, and checkpointed with a durable watermark.

pub mod config;
pub mod destination;
pub mod error;
pub mod extractor;
pub mod http;
pub mod loader;
pub mod orchestrator;
pub mod paginator;
pub mod registry;
pub mod report;
pub mod resolve;
pub mod watermark;

// Re-export public API for convenience
pub use config::ConfigurationError;
pub use error::{PipelineError, RetryPolicy};
pub use orchestrator::{check_pipeline, run_pipeline, Orchestrator, RunSettings};
pub use report::{CheckResult, ResourceReport, ResourceStatus, RunOutcome, RunReport};

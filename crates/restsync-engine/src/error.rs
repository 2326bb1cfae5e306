//! Pipeline error model and retry backoff policy helpers.

use std::time::Duration;

use restsync_state::StateError;
use restsync_types::error::{BackoffClass, ExtractError};

use crate::config::ConfigurationError;
use crate::destination::DestinationError;

const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
const DEFAULT_MAX_RETRIES: u32 = 5;

// ---------------------------------------------------------------------------
// PipelineError: categorised errors for retry and reporting decisions
// ---------------------------------------------------------------------------

/// Categorized pipeline error.
///
/// `Extract` wraps a typed [`ExtractError`] with retry metadata. Every other
/// variant is terminal for the resource that raised it; only `Config`
/// aborts a run before any extraction starts.
#[derive(Debug)]
pub enum PipelineError {
    /// Invalid pipeline or resource configuration.
    Config(ConfigurationError),
    /// Page fetch or decode failure with retry metadata.
    Extract(ExtractError),
    /// Watermark store or run-history failure.
    State(StateError),
    /// Destination write failure.
    Destination(DestinationError),
    /// The run was cancelled at a page boundary.
    Cancelled,
    /// Host-side failure (task join, lease conflict, I/O).
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Extract(e) => write!(f, "{e}"),
            Self::State(e) => write!(f, "state: {e}"),
            Self::Destination(e) => write!(f, "destination: {e}"),
            Self::Cancelled => f.write_str("run cancelled"),
            Self::Infrastructure(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

impl From<StateError> for PipelineError {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}

impl From<DestinationError> for PipelineError {
    fn from(e: DestinationError) -> Self {
        Self::Destination(e)
    }
}

impl From<ConfigurationError> for PipelineError {
    fn from(e: ConfigurationError) -> Self {
        Self::Config(e)
    }
}

impl PipelineError {
    /// Returns `true` if this is a typed extraction error marked retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Extract(e) => e.retryable,
            _ => false,
        }
    }

    /// Returns the typed extraction error if this is an `Extract` variant.
    pub fn as_extract_error(&self) -> Option<&ExtractError> {
        match self {
            Self::Extract(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for page-level transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per page after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

/// Compute retry delay based on error hints and attempt number (1-based).
pub(crate) fn compute_backoff(policy: &RetryPolicy, err: &ExtractError, attempt: u32) -> Duration {
    if let Some(ms) = err.retry_after_ms {
        return Duration::from_millis(ms).min(policy.max_delay);
    }

    let base = policy.base_delay;
    let class_base = match err.backoff_class {
        BackoffClass::Fast => base / 10,
        BackoffClass::Normal => base,
        BackoffClass::Slow => base.saturating_mul(5),
    };

    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    class_base.saturating_mul(factor).min(policy.max_delay)
}

//! Structured error model for page extraction.
//!
//! [`ExtractError`] carries classification, retry metadata, and optional
//! diagnostic details. Construct via category-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of an extraction error.
///
/// Determines default retry behavior and operator-facing categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid request configuration.
    Config,
    /// 401/403 from the source (fatal for the resource).
    Auth,
    /// Timeout or connection failure (retryable).
    TransientNetwork,
    /// 5xx from the source (retryable).
    TransientHttp,
    /// 429 from the source (retryable, slow backoff).
    RateLimit,
    /// Any other non-success status (fatal for the resource).
    Http,
    /// Body missing the item selector or total count, or malformed records.
    Decode,
    /// Server-reported total changed mid-extraction under a snapshot policy.
    Drift,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::TransientNetwork => "transient_network",
            Self::TransientHttp => "transient_http",
            Self::RateLimit => "rate_limit",
            Self::Http => "http",
            Self::Decode => "decode",
            Self::Drift => "drift",
        };
        f.write_str(s)
    }
}

/// Retry backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffClass {
    /// One tenth of the base delay.
    Fast,
    /// The configured base delay.
    Normal,
    /// Five times the base delay.
    Slow,
}

/// Structured error from fetching or decoding one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct ExtractError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub backoff_class: BackoffClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ExtractError {
    fn new(
        category: ErrorCategory,
        retryable: bool,
        backoff_class: BackoffClass,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retryable,
            retry_after_ms: None,
            backoff_class,
            status: None,
            details: None,
        }
    }

    /// Request could not be built from the resource configuration.
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, false, BackoffClass::Normal, code, message)
    }

    /// Authentication/authorization rejected (not retryable).
    #[must_use]
    pub fn auth(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Auth, false, BackoffClass::Normal, "AUTH_REJECTED", message)
            .with_status(status)
    }

    /// Timeout or connection failure (retryable, normal backoff).
    #[must_use]
    pub fn transient_network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientNetwork, true, BackoffClass::Normal, code, message)
    }

    /// Server error status (retryable, normal backoff).
    #[must_use]
    pub fn transient_http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientHttp, true, BackoffClass::Normal, "SERVER_ERROR", message)
            .with_status(status)
    }

    /// Rate limit status (retryable, slow backoff).
    #[must_use]
    pub fn rate_limit(message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        let mut err = Self::new(ErrorCategory::RateLimit, true, BackoffClass::Slow, "RATE_LIMITED", message)
            .with_status(429);
        err.retry_after_ms = retry_after_ms;
        err
    }

    /// Unexpected non-success status (not retryable).
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Http, false, BackoffClass::Normal, "HTTP_STATUS", message)
            .with_status(status)
    }

    /// Response body could not be decoded (not retryable).
    #[must_use]
    pub fn decode(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Decode, false, BackoffClass::Normal, code, message)
    }

    /// Total count changed mid-extraction (not retryable).
    #[must_use]
    pub fn drift(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Drift, false, BackoffClass::Normal, "TOTAL_DRIFT", message)
    }

    /// Attach the HTTP status that produced this error.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Classify a non-success HTTP status.
    ///
    /// Returns `None` for 2xx statuses.
    #[must_use]
    pub fn from_status(status: u16, retry_after_ms: Option<u64>, body_excerpt: &str) -> Option<Self> {
        let message = if body_excerpt.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body_excerpt}")
        };
        match status {
            200..=299 => None,
            401 | 403 => Some(Self::auth(status, message)),
            429 => Some(Self::rate_limit(message, retry_after_ms)),
            500..=599 => Some(Self::transient_http(status, message)),
            _ => Some(Self::http(status, message)),
        }
    }
}

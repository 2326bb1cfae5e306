//! Pipeline configuration: YAML model, parsing, and validation.

pub mod parser;
pub mod types;
pub mod validator;

/// Every problem found while validating a pipeline configuration.
///
/// Raised before any extraction starts; a run never begins with an
/// invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Pipeline validation failed:\n  - {}", .problems.join("\n  - "))]
pub struct ConfigurationError {
    pub problems: Vec<String>,
}

impl ConfigurationError {
    #[must_use]
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// Fail with `problems` unless the list is empty.
    ///
    /// # Errors
    ///
    /// Returns `Err` when at least one problem was collected.
    pub fn check(problems: Vec<String>) -> Result<(), Self> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Self::new(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_problem() {
        let err = ConfigurationError::new(vec!["first".into(), "second".into()]);
        let msg = err.to_string();
        assert!(msg.starts_with("Pipeline validation failed:"));
        assert!(msg.contains("  - first"));
        assert!(msg.contains("  - second"));
    }

    #[test]
    fn check_passes_on_empty() {
        assert!(ConfigurationError::check(Vec::new()).is_ok());
        assert!(ConfigurationError::check(vec!["x".into()]).is_err());
    }
}

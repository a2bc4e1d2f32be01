//! Sweep error taxonomy

use thiserror::Error;

/// Errors that abort a sweep as a whole.
///
/// Per-run problems never show up here: an infeasible combination yields a
/// degenerate [`RunResult`](crate::RunResult) instead.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid configuration `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("invalid grid override `{input}`: {reason}")]
    InvalidOverride { input: String, reason: String },

    #[error("parameter grid is empty: no combinations to evaluate")]
    EmptyGrid,

    #[error("no valid configuration found ({evaluated} combinations evaluated, none feasible)")]
    NoValidConfiguration { evaluated: usize },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl SweepError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        SweepError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by what the user asked for, reported as usage errors.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SweepError::InvalidConfig { .. }
                | SweepError::InvalidOverride { .. }
                | SweepError::EmptyGrid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(SweepError::EmptyGrid.is_configuration());
        assert!(SweepError::invalid("workers", "must be at least 1").is_configuration());
        assert!(!SweepError::NoValidConfiguration { evaluated: 3 }.is_configuration());
    }

    #[test]
    fn test_no_valid_configuration_message() {
        let err = SweepError::NoValidConfiguration { evaluated: 12 };
        assert!(err.to_string().contains("no valid configuration found"));
        assert!(err.to_string().contains("12"));
    }
}

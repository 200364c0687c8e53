//! Error taxonomy for fleet optimization runs

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    /// The external capability could not be reached or constructed.
    #[error("{adapter} unavailable: {reason}")]
    AdapterUnavailable { adapter: &'static str, reason: String },

    /// The capability was reachable but failed while training, predicting or solving.
    #[error("{adapter} failed: {reason}")]
    AdapterExecution { adapter: &'static str, reason: String },

    #[error("{adapter} did not answer within {after:?}")]
    AdapterTimeout { adapter: &'static str, after: Duration },

    #[error("min_service={min_service} exceeds fleet size {fleet_size}")]
    ConstraintUnsatisfiable { min_service: usize, fleet_size: usize },

    #[error("schedule history is missing columns {missing:?} (found {found:?})")]
    SchemaMismatch { missing: Vec<&'static str>, found: Vec<String> },

    #[error("schedule history row {row}: column '{column}' has invalid value '{value}'")]
    InvalidHistoryValue { row: usize, column: &'static str, value: String },

    #[error("fleet roster is empty")]
    EmptyRoster,

    #[error("train '{0}' appears more than once in the roster")]
    DuplicateTrain(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FleetError {
    /// Errors the caller can fix by changing the request.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, FleetError::ConstraintUnsatisfiable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_timeout_is_not_a_bad_request() {
        let e = FleetError::AdapterTimeout { adapter: "delay", after: Duration::from_secs(1) };
        assert!(!e.is_bad_request());
        assert_eq!(e.to_string(), "delay did not answer within 1s");
    }

    #[test]
    fn test_constraint_error_is_bad_request() {
        let e = FleetError::ConstraintUnsatisfiable { min_service: 30, fleet_size: 25 };
        assert!(e.is_bad_request());
        assert_eq!(e.to_string(), "min_service=30 exceeds fleet size 25");
    }
}

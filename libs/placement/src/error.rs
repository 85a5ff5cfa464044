//! Placement errors.

use thiserror::Error;

/// Invalid placement parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    /// The relative trigger must be a finite number of at least 1.0.
    #[error("trigger ratio must be finite and >= 1.0, got {0}")]
    InvalidTriggerRatio(f64),

    /// The absolute improvement must be a finite non-negative number.
    #[error("minimum improvement must be finite and >= 0, got {0}")]
    InvalidMinImprovement(f64),
}

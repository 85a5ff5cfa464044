//! Follow-the-sun tuning parameters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;
use crate::location::Location;

/// Default relative margin: the best location must carry 30% more demand
/// than the current one.
pub const DEFAULT_TRIGGER_RATIO: f64 = 1.3;

/// Default absolute margin, in demand-weight units.
pub const DEFAULT_MIN_IMPROVEMENT: f64 = 1.0;

/// Significance margin and location constraints for relocation decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowTheSunParameters {
    /// Relocate only if `best > current * trigger_ratio`.
    pub trigger_ratio: f64,

    /// Relocate only if `best - current > min_improvement`.
    pub min_improvement: f64,

    /// Locations items must never be moved into.
    #[serde(default)]
    pub excluded_locations: BTreeSet<Location>,
}

impl Default for FollowTheSunParameters {
    fn default() -> Self {
        Self {
            trigger_ratio: DEFAULT_TRIGGER_RATIO,
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
            excluded_locations: BTreeSet::new(),
        }
    }
}

impl FollowTheSunParameters {
    /// Reject margins that would make every or no comparison succeed.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !self.trigger_ratio.is_finite() || self.trigger_ratio < 1.0 {
            return Err(ParameterError::InvalidTriggerRatio(self.trigger_ratio));
        }
        if !self.min_improvement.is_finite() || self.min_improvement < 0.0 {
            return Err(ParameterError::InvalidMinImprovement(self.min_improvement));
        }
        Ok(())
    }

    /// Returns true if moving from `current_weight` to `best_weight` is worth it.
    ///
    /// Both margins must be exceeded.
    pub fn is_significant(&self, current_weight: f64, best_weight: f64) -> bool {
        best_weight - current_weight > self.min_improvement
            && best_weight > current_weight * self.trigger_ratio
    }

    /// Returns true if items may be moved into `location`.
    pub fn allows(&self, location: &Location) -> bool {
        !self.excluded_locations.contains(location)
    }
}

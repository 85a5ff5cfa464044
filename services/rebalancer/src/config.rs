//! Configuration for the rebalancing policy.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use sunward_placement::{FollowTheSunParameters, Location};

use crate::error::ConfigError;

/// Default minimum gap between the starts of two passes.
pub const DEFAULT_MIN_PERIOD_BETWEEN_EXECS: Duration = Duration::from_secs(10);

/// Default periodic timer interval.
pub const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(5);

/// Default mailbox capacity.
pub const DEFAULT_MAILBOX_SIZE: usize = 256;

/// Rebalancing policy configuration.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Minimum gap between the starts of two passes.
    pub min_period_between_execs: Duration,

    /// Interval of the periodic re-evaluation timer.
    pub periodic_interval: Duration,

    /// Capacity of the policy mailbox.
    pub mailbox_size: usize,

    /// Significance margin and excluded locations.
    pub parameters: FollowTheSunParameters,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_period_between_execs: DEFAULT_MIN_PERIOD_BETWEEN_EXECS,
            periodic_interval: DEFAULT_PERIODIC_INTERVAL,
            mailbox_size: DEFAULT_MAILBOX_SIZE,
            parameters: FollowTheSunParameters::default(),
            log_level: "info".to_string(),
        }
    }
}

impl PolicyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Missing keys fall back to defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let min_period_between_execs = parse_var::<u64, _>(&lookup, "SUNWARD_MIN_PERIOD_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_period_between_execs);

        let periodic_interval = parse_var::<u64, _>(&lookup, "SUNWARD_PERIODIC_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.periodic_interval);

        let mailbox_size =
            parse_var(&lookup, "SUNWARD_MAILBOX_SIZE")?.unwrap_or(defaults.mailbox_size);

        let mut parameters = defaults.parameters;
        if let Some(ratio) = parse_var(&lookup, "SUNWARD_TRIGGER_RATIO")? {
            parameters.trigger_ratio = ratio;
        }
        if let Some(improvement) = parse_var(&lookup, "SUNWARD_MIN_IMPROVEMENT")? {
            parameters.min_improvement = improvement;
        }
        if let Some(excluded) = lookup("SUNWARD_EXCLUDED_LOCATIONS") {
            parameters.excluded_locations = parse_locations(&excluded);
        }

        let log_level = lookup("SUNWARD_LOG_LEVEL").unwrap_or(defaults.log_level);

        let config = Self {
            min_period_between_execs,
            periodic_interval,
            mailbox_size,
            parameters,
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.periodic_interval.is_zero() {
            return Err(ConfigError::ZeroPeriodicInterval);
        }
        if self.mailbox_size == 0 {
            return Err(ConfigError::ZeroMailbox);
        }
        self.parameters.validate()?;
        Ok(())
    }

    pub fn with_min_period_between_execs(mut self, period: Duration) -> Self {
        self.min_period_between_execs = period;
        self
    }

    pub fn with_periodic_interval(mut self, interval: Duration) -> Self {
        self.periodic_interval = interval;
        self
    }

    pub fn with_mailbox_size(mut self, size: usize) -> Self {
        self.mailbox_size = size;
        self
    }

    pub fn with_parameters(mut self, parameters: FollowTheSunParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Never move items into `location`.
    pub fn with_excluded_location(mut self, location: impl Into<Location>) -> Self {
        self.parameters.excluded_locations.insert(location.into());
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    let parsed = value.trim().parse::<T>();
    parsed.map(Some).map_err(|e| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_locations(value: &str) -> BTreeSet<Location> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Location::new)
        .collect()
}

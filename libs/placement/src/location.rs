//! Location identity.

use serde::{Deserialize, Serialize};

/// An opaque place an item can be hosted in (datacenter, region, host pool).
///
/// Only identity, equality and a total order matter to the placement core.
/// The order is used to break ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    /// Create a location from its display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The location's display name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Location {
    fn from(name: String) -> Self {
        Self(name)
    }
}

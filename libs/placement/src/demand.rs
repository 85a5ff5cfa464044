//! Demand vectors.
//!
//! A demand vector records how much of an item's work is directed at each
//! other item (calls made, messages sent). The values are opaque application
//! data to the placement core and are replaced wholesale on every update.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Mapping of target item to a non-negative, finite weight.
///
/// Weights that are negative, NaN or infinite are dropped on the way in;
/// they carry no usable information about where demand originates.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandVector<I: Ord> {
    weights: BTreeMap<I, f64>,
}

impl<I: Ord> DemandVector<I> {
    /// Create an empty demand vector.
    pub fn new() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Set the weight toward `target`.
    ///
    /// Returns false (and leaves the vector unchanged) if the weight is not
    /// a finite non-negative number.
    pub fn insert(&mut self, target: I, weight: f64) -> bool {
        if !is_valid_weight(weight) {
            return false;
        }
        self.weights.insert(target, weight);
        true
    }

    /// Remove `target` from the vector, returning its weight.
    pub fn remove(&mut self, target: &I) -> Option<f64> {
        self.weights.remove(target)
    }

    /// Weight toward `target`, if any.
    pub fn weight(&self, target: &I) -> Option<f64> {
        self.weights.get(target).copied()
    }

    /// Iterate over `(target, weight)` pairs in target order.
    pub fn iter(&self) -> impl Iterator<Item = (&I, f64)> {
        self.weights.iter().map(|(target, weight)| (target, *weight))
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns true if there are no targets.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of all weights, including any directed at the item itself.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}

impl<I: Ord> Default for DemandVector<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Ord> FromIterator<(I, f64)> for DemandVector<I> {
    fn from_iter<T: IntoIterator<Item = (I, f64)>>(iter: T) -> Self {
        let weights = iter
            .into_iter()
            .filter(|(_, weight)| is_valid_weight(*weight))
            .collect();
        Self { weights }
    }
}

impl<I: Ord + Serialize> Serialize for DemandVector<I> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.weights.serialize(serializer)
    }
}

impl<'de, I: Ord + Deserialize<'de>> Deserialize<'de> for DemandVector<I> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<I, f64>::deserialize(deserializer).map(|weights| weights.into_iter().collect())
    }
}

fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

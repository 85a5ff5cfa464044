//! Workload usage model and follow-the-sun placement.
//!
//! This library holds the pure half of the rebalancer: the data model of
//! items, containers, locations and pairwise demand, and the decision rule
//! that says whether an item should move. It owns no threads and performs
//! no moves. Key concepts:
//!
//! - **Demand vector**: how much of an item's work is directed at each other item.
//! - **Demand by target location**: an item's demand vector grouped by where
//!   each target currently is. Derived on read, never stored.
//! - **Optimal location**: the location with the greatest aggregate demand.
//! - **Significance margin**: how much better a location must be before an
//!   item is moved there.
//!
//! # Invariants
//!
//! - Every model mutator is total; unknown keys are no-ops
//! - Self-directed demand never counts toward or against a location
//! - Decisions are deterministic given the same model and parameters
//! - Immovable items are never chosen for relocation, but their demand still
//!   shapes everyone else's view

mod demand;
mod error;
mod location;
mod model;
mod params;
mod report;
mod failures;
mod strategy;

pub use demand::DemandVector;
pub use error::ParameterError;
pub use location::Location;
pub use model::{best_location, LocationDemand, UsageModel};
pub use params::{FollowTheSunParameters, DEFAULT_MIN_IMPROVEMENT, DEFAULT_TRIGGER_RATIO};
pub use report::{ContainerReport, ItemDistribution, ItemReport, LocationReport};
pub use failures::{FailureOutcome, MoveFailures, DEFAULT_FAILURE_WINDOW, DEFAULT_MAX_MOVE_FAILURES};
pub use strategy::{Decision, FollowTheSunStrategy, Relocation, StayReason};

/// Bounds for item and container keys.
///
/// Keys are externally-owned identities. The total order gives the model
/// deterministic iteration and tie-breaking.
pub trait Key: Clone + Ord + std::fmt::Debug + Send + Sync + 'static {}

impl<T> Key for T where T: Clone + Ord + std::fmt::Debug + Send + Sync + 'static {}

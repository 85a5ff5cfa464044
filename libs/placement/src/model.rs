//! Workload usage model.
//!
//! The model is the authoritative record of which container each item is
//! hosted in, which location each container is in, and each item's demand
//! vector. Everything placement decisions need (item location, demand grouped
//! by target location, optimal location) is derived from those three maps on
//! read, so a single `&UsageModel` is always a coherent snapshot.
//!
//! The model never moves anything. Its mutators are the only write path and
//! none of them can fail: unknown keys are ignored.

use std::collections::{BTreeMap, BTreeSet};

use crate::demand::DemandVector;
use crate::location::Location;
use crate::Key;

/// Per-item record.
#[derive(Debug, Clone)]
struct TrackedItem<I: Ord, C> {
    container: Option<C>,
    immovable: bool,
    demand: DemandVector<I>,
}

/// Demand aggregated by the location of each target.
pub type LocationDemand = BTreeMap<Location, f64>;

/// In-memory usage model over item keys `I` and container keys `C`.
#[derive(Debug, Clone)]
pub struct UsageModel<I: Key, C: Key> {
    name: String,
    /// Container -> location. `None` while the location is unresolved.
    containers: BTreeMap<C, Option<Location>>,
    items: BTreeMap<I, TrackedItem<I, C>>,
}

impl<I: Key, C: Key> UsageModel<I, C> {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            containers: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }

    /// Model name, used in logs and reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Register an item. Re-adding a known item updates its container and
    /// immovable flag but keeps its demand vector.
    pub fn on_item_added(&mut self, item: I, container: Option<C>, immovable: bool) {
        self.items
            .entry(item)
            .and_modify(|tracked| {
                tracked.container = container.clone();
                tracked.immovable = immovable;
            })
            .or_insert_with(|| TrackedItem {
                container,
                immovable,
                demand: DemandVector::new(),
            });
    }

    /// Deregister an item.
    ///
    /// Other items' demand vectors are left as reported. Demand toward the
    /// removed item drops out of every view because it has no location, and
    /// counts again if the same item is added back.
    pub fn on_item_removed(&mut self, item: &I) {
        self.items.remove(item);
    }

    /// Record that an item is now hosted by `new_container` (or by nothing).
    ///
    /// Returns false if the item is unknown.
    pub fn on_item_moved(&mut self, item: &I, new_container: Option<C>) -> bool {
        match self.items.get_mut(item) {
            Some(tracked) => {
                tracked.container = new_container;
                true
            }
            None => false,
        }
    }

    /// Register a container. `None` records it with an unresolved location.
    pub fn on_container_added(&mut self, container: C, location: Option<Location>) {
        self.containers.insert(container, location);
    }

    /// Deregister a container. Items still hosted by it become host-less.
    pub fn on_container_removed(&mut self, container: &C) {
        if self.containers.remove(container).is_none() {
            return;
        }
        for tracked in self.items.values_mut() {
            if tracked.container.as_ref() == Some(container) {
                tracked.container = None;
            }
        }
    }

    /// Set the location of a known container.
    ///
    /// Returns false if the container is unknown; an update can overtake the
    /// container's addition, in which case the addition resolves it.
    pub fn on_container_location_updated(&mut self, container: &C, location: Location) -> bool {
        match self.containers.get_mut(container) {
            Some(slot) => {
                *slot = Some(location);
                true
            }
            None => false,
        }
    }

    /// Replace an item's whole demand vector.
    ///
    /// Returns false if the item is unknown. Removal notifications and usage
    /// updates come from different sources and can overtake each other.
    pub fn update_item_usage(&mut self, item: &I, demand: DemandVector<I>) -> bool {
        match self.items.get_mut(item) {
            Some(tracked) => {
                tracked.demand = demand;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All tracked items.
    pub fn items(&self) -> impl Iterator<Item = &I> {
        self.items.keys()
    }

    /// Number of tracked items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the item is tracked.
    pub fn has_item(&self, item: &I) -> bool {
        self.items.contains_key(item)
    }

    /// All tracked containers.
    pub fn containers(&self) -> impl Iterator<Item = &C> {
        self.containers.keys()
    }

    /// Returns true if the container is tracked.
    pub fn has_container(&self, container: &C) -> bool {
        self.containers.contains_key(container)
    }

    /// Containers whose location has not been resolved yet.
    pub fn unresolved_containers(&self) -> impl Iterator<Item = &C> {
        self.containers
            .iter()
            .filter(|(_, location)| location.is_none())
            .map(|(container, _)| container)
    }

    /// Container currently hosting `item`.
    pub fn item_container(&self, item: &I) -> Option<&C> {
        self.items.get(item)?.container.as_ref()
    }

    /// Location of the container currently hosting `item`.
    pub fn item_location(&self, item: &I) -> Option<&Location> {
        let container = self.item_container(item)?;
        self.container_location(container)
    }

    /// Resolved location of `container`.
    pub fn container_location(&self, container: &C) -> Option<&Location> {
        self.containers.get(container)?.as_ref()
    }

    /// The item's demand vector, if the item is tracked.
    pub fn item_demand(&self, item: &I) -> Option<&DemandVector<I>> {
        self.items.get(item).map(|tracked| &tracked.demand)
    }

    /// Known and not flagged immovable.
    pub fn is_item_movable(&self, item: &I) -> bool {
        self.items.get(item).is_some_and(|tracked| !tracked.immovable)
    }

    /// Distinct resolved locations of tracked containers.
    pub fn locations(&self) -> BTreeSet<&Location> {
        self.containers.values().flatten().collect()
    }

    /// Containers whose resolved location is `location`.
    pub fn containers_in_location<'a>(&'a self, location: &'a Location) -> impl Iterator<Item = &'a C> {
        self.containers
            .iter()
            .filter(move |(_, l)| l.as_ref() == Some(location))
            .map(|(container, _)| container)
    }

    /// Items currently hosted by `container`.
    pub fn items_on_container<'a>(&'a self, container: &'a C) -> impl Iterator<Item = &'a I> {
        self.items
            .iter()
            .filter(move |(_, tracked)| tracked.container.as_ref() == Some(container))
            .map(|(item, _)| item)
    }

    /// Containers in `location` that `item` could be moved to.
    pub fn available_containers_for<'a>(
        &'a self,
        item: &I,
        location: &'a Location,
    ) -> impl Iterator<Item = &'a C> {
        let current = self.item_container(item).cloned();
        self.containers_in_location(location)
            .filter(move |container| Some(*container) != current.as_ref())
    }

    /// Total raw demand of every item hosted by `container`.
    ///
    /// Self-directed demand counts: it is still work done in that container.
    pub fn container_load(&self, container: &C) -> f64 {
        self.items
            .values()
            .filter(|tracked| tracked.container.as_ref() == Some(container))
            .map(|tracked| tracked.demand.total())
            .sum()
    }

    /// The item's demand grouped by the current location of each target.
    ///
    /// Self-references, unknown targets, host-less targets and targets whose
    /// container location is unresolved contribute nothing.
    pub fn demand_by_target_location(&self, item: &I) -> LocationDemand {
        let mut by_location = LocationDemand::new();
        let Some(tracked) = self.items.get(item) else {
            return by_location;
        };

        for (target, weight) in tracked.demand.iter() {
            if target == item {
                continue;
            }
            let Some(location) = self.item_location(target) else {
                continue;
            };
            *by_location.entry(location.clone()).or_insert(0.0) += weight;
        }

        by_location
    }

    /// For every item with a non-empty demand vector, its demand grouped by
    /// target location, keyed by the sending item.
    pub fn direct_sends_to_item_by_location(&self) -> BTreeMap<I, LocationDemand> {
        self.items
            .iter()
            .filter(|(_, tracked)| !tracked.demand.is_empty())
            .map(|(item, _)| (item.clone(), self.demand_by_target_location(item)))
            .collect()
    }

    /// The location with the greatest aggregate demand for `item`.
    ///
    /// Ties go to the smallest location. `None` if the item has no
    /// located targets.
    pub fn optimal_location(&self, item: &I) -> Option<Location> {
        best_location(&self.demand_by_target_location(item), |_| true).map(|(location, _)| location.clone())
    }
}

/// Highest-weighted location in `view` accepted by `allowed`.
///
/// The view is ordered, so keeping only strictly greater weights resolves
/// ties to the smallest location.
pub fn best_location<F>(view: &LocationDemand, allowed: F) -> Option<(&Location, f64)>
where
    F: Fn(&Location) -> bool,
{
    let mut best: Option<(&Location, f64)> = None;
    for (location, weight) in view {
        if !allowed(location) {
            continue;
        }
        match best {
            Some((_, best_weight)) if *weight <= best_weight => {}
            _ => best = Some((location, *weight)),
        }
    }
    best
}

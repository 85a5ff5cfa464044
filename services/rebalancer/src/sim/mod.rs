//! Simulated substrate.
//!
//! In-memory items, containers and groups implementing the entity and
//! group traits. Used by the tests and the demo binary; moves are instant
//! unless a delay is configured, and can be made to fail.

mod entities;
mod group;

use std::sync::Arc;

use sunward_id::{ContainerId, ItemId};
use sunward_placement::Location;

pub use entities::{MoveRecord, SimContainer, SimItem};
pub use group::SimGroup;

use crate::pool::Pool;
use crate::sensors::{SensorBus, SensorEvent, DEFAULT_SENSOR_CAPACITY};

/// A sensor bus plus a containers group and an items group.
pub struct SimWorld {
    sensors: SensorBus<SimItem>,
    containers: Arc<SimGroup<SimContainer>>,
    items: Arc<SimGroup<SimItem>>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::with_sensor_capacity(DEFAULT_SENSOR_CAPACITY)
    }

    pub fn with_sensor_capacity(capacity: usize) -> Self {
        Self {
            sensors: SensorBus::new(capacity),
            containers: Arc::new(SimGroup::new()),
            items: Arc::new(SimGroup::new()),
        }
    }

    pub fn sensors(&self) -> &SensorBus<SimItem> {
        &self.sensors
    }

    /// A pool over this world's groups.
    pub fn pool(&self) -> Pool<SimItem> {
        Pool::new(self.containers.clone(), self.items.clone())
    }

    /// Add a container declaring a single location.
    pub fn add_container(&self, name: &str, location: impl Into<Location>) -> SimContainer {
        self.add_container_with_locations(name, vec![location.into()])
    }

    pub fn add_container_with_locations(&self, name: &str, locations: Vec<Location>) -> SimContainer {
        let container = SimContainer::new(ContainerId::new(), name, locations);
        self.containers.add(container.clone());
        container
    }

    pub fn remove_container(&self, container: &SimContainer) -> bool {
        self.containers.remove(container)
    }

    /// Change a container's declared location and publish it.
    pub fn set_container_location(&self, container: &SimContainer, location: Option<Location>) {
        container.set_locations(location.iter().cloned().collect());
        self.sensors.publish(SensorEvent::LocationChanged {
            container: container.clone(),
            location,
        });
    }

    pub fn add_item(&self, name: &str, container: &SimContainer) -> SimItem {
        self.insert_item(name, Some(container.clone()), false)
    }

    pub fn add_immovable_item(&self, name: &str, container: &SimContainer) -> SimItem {
        self.insert_item(name, Some(container.clone()), true)
    }

    /// Add an item that is not hosted anywhere.
    pub fn add_item_unplaced(&self, name: &str) -> SimItem {
        self.insert_item(name, None, false)
    }

    fn insert_item(&self, name: &str, container: Option<SimContainer>, immovable: bool) -> SimItem {
        let item = SimItem::new(ItemId::new(), name, container, immovable, self.sensors.clone());
        self.items.add(item.clone());
        item
    }

    /// Stop managing an item.
    pub fn remove_item(&self, item: &SimItem) -> bool {
        self.items.remove(item)
    }

    /// Manage an existing item again after [`remove_item`](Self::remove_item).
    pub fn readd_item(&self, item: &SimItem) -> bool {
        self.items.add(item.clone())
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

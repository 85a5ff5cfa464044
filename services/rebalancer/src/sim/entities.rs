//! Simulated items and containers.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sunward_id::{ContainerId, ItemId};
use sunward_placement::{DemandVector, Location};
use tokio::time::Instant;
use tracing::debug;

use crate::entity::{Container, Item};
use crate::error::MoveError;
use crate::sensors::{SensorBus, SensorEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Container
// =============================================================================

/// An in-memory container with a mutable list of declared locations.
#[derive(Clone)]
pub struct SimContainer {
    id: ContainerId,
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    name: String,
    locations: Mutex<Vec<Location>>,
}

impl SimContainer {
    pub fn new(id: ContainerId, name: impl Into<String>, locations: Vec<Location>) -> Self {
        Self {
            id,
            inner: Arc::new(ContainerInner {
                name: name.into(),
                locations: Mutex::new(locations),
            }),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Replace the declared locations. Publishing the change is up to the caller.
    pub fn set_locations(&self, locations: Vec<Location>) {
        *lock(&self.inner.locations) = locations;
    }
}

impl Container for SimContainer {
    fn locations(&self) -> Vec<Location> {
        lock(&self.inner.locations).clone()
    }
}

impl PartialEq for SimContainer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SimContainer {}

impl PartialOrd for SimContainer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimContainer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for SimContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimContainer")
            .field("id", &self.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl fmt::Display for SimContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

// =============================================================================
// Item
// =============================================================================

/// A completed simulated move.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub from: Option<SimContainer>,
    pub to: SimContainer,
    pub at: Instant,
}

/// An in-memory item that publishes its attribute changes on a sensor bus.
#[derive(Clone)]
pub struct SimItem {
    id: ItemId,
    inner: Arc<ItemInner>,
}

struct ItemInner {
    name: String,
    immovable: bool,
    sensors: SensorBus<SimItem>,
    state: Mutex<ItemState>,
}

#[derive(Default)]
struct ItemState {
    container: Option<SimContainer>,
    demand: Option<DemandVector<SimItem>>,
    fail_moves: bool,
    move_delay: Option<Duration>,
    moves: Vec<MoveRecord>,
}

impl SimItem {
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        container: Option<SimContainer>,
        immovable: bool,
        sensors: SensorBus<SimItem>,
    ) -> Self {
        Self {
            id,
            inner: Arc::new(ItemInner {
                name: name.into(),
                immovable,
                sensors,
                state: Mutex::new(ItemState {
                    container,
                    ..Default::default()
                }),
            }),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn state(&self) -> MutexGuard<'_, ItemState> {
        lock(&self.inner.state)
    }

    /// Replace the demand vector and publish it.
    pub fn set_demand<T>(&self, demand: T)
    where
        T: IntoIterator<Item = (SimItem, f64)>,
    {
        let demand: DemandVector<SimItem> = demand.into_iter().collect();
        self.state().demand = Some(demand.clone());
        self.inner.sensors.publish(SensorEvent::DemandChanged {
            item: self.clone(),
            demand: Some(demand),
        });
    }

    /// Forget the demand vector, as if the reading were lost.
    pub fn clear_demand(&self) {
        self.state().demand = None;
        self.inner.sensors.publish(SensorEvent::DemandChanged {
            item: self.clone(),
            demand: None,
        });
    }

    /// Move the item outside the policy's control.
    pub fn relocate(&self, container: Option<&SimContainer>) {
        self.state().container = container.cloned();
        self.inner.sensors.publish(SensorEvent::ContainerChanged {
            item: self.clone(),
            container: container.cloned(),
        });
    }

    /// Make every following `move_to` fail, or succeed again.
    pub fn fail_moves(&self, fail: bool) {
        self.state().fail_moves = fail;
    }

    /// Delay every following `move_to` by `delay`.
    pub fn set_move_delay(&self, delay: Option<Duration>) {
        self.state().move_delay = delay;
    }

    /// Moves performed through `move_to`, oldest first.
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.state().moves.clone()
    }
}

#[async_trait]
impl Item for SimItem {
    type Container = SimContainer;

    fn is_immovable(&self) -> bool {
        self.inner.immovable
    }

    fn container(&self) -> Option<SimContainer> {
        self.state().container.clone()
    }

    fn demand(&self) -> Option<DemandVector<SimItem>> {
        self.state().demand.clone()
    }

    async fn move_to(&self, container: &SimContainer) -> Result<(), MoveError> {
        if self.inner.immovable {
            return Err(MoveError::Rejected(format!("{self} is immovable")));
        }
        let delay = self.state().move_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let from = {
            let mut state = self.state();
            if state.fail_moves {
                return Err(anyhow::anyhow!("simulated failure moving {} to {}", self, container).into());
            }
            let from = state.container.replace(container.clone());
            state.moves.push(MoveRecord {
                from: from.clone(),
                to: container.clone(),
                at: Instant::now(),
            });
            from
        };

        debug!(
            item = %self,
            from = from.as_ref().map(SimContainer::name).unwrap_or("-"),
            to = %container,
            "Simulated move"
        );
        self.inner.sensors.publish(SensorEvent::ContainerChanged {
            item: self.clone(),
            container: Some(container.clone()),
        });
        Ok(())
    }
}

impl PartialEq for SimItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SimItem {}

impl PartialOrd for SimItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for SimItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimItem")
            .field("id", &self.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

impl fmt::Display for SimItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

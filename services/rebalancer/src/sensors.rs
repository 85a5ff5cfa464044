//! Attribute-change notifications from the substrate.

use sunward_placement::{DemandVector, Location};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::entity::Item;
use crate::policy::{PolicyHandle, PolicyMessage};

/// Default sensor bus capacity.
pub const DEFAULT_SENSOR_CAPACITY: usize = 1024;

/// A change to an attribute the policy tracks.
#[derive(Debug, Clone)]
pub enum SensorEvent<I: Item> {
    /// An item's demand vector changed. `None` means the reading was lost.
    DemandChanged {
        item: I,
        demand: Option<DemandVector<I>>,
    },

    /// An item now runs on `container`, or nowhere.
    ContainerChanged {
        item: I,
        container: Option<I::Container>,
    },

    /// A container's location changed. `None` means it is unknown again.
    LocationChanged {
        container: I::Container,
        location: Option<Location>,
    },
}

impl<I: Item> SensorEvent<I> {
    fn into_message(self) -> PolicyMessage<I> {
        match self {
            Self::DemandChanged { item, demand } => PolicyMessage::DemandUpdated { item, demand },
            Self::ContainerChanged { item, container } => PolicyMessage::ItemMoved { item, container },
            Self::LocationChanged {
                container,
                location,
            } => PolicyMessage::ContainerLocationUpdated {
                container,
                location,
            },
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DemandChanged { .. } => "demand_changed",
            Self::ContainerChanged { .. } => "container_changed",
            Self::LocationChanged { .. } => "location_changed",
        }
    }
}

/// Broadcast channel carrying [`SensorEvent`]s.
#[derive(Debug, Clone)]
pub struct SensorBus<I: Item> {
    tx: broadcast::Sender<SensorEvent<I>>,
}

impl<I: Item> SensorBus<I> {
    /// Create a bus holding up to `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Events with no subscribers are dropped.
    pub fn publish(&self, event: SensorEvent<I>) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SensorEvent<I>> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<I: Item> Default for SensorBus<I> {
    fn default() -> Self {
        Self::new(DEFAULT_SENSOR_CAPACITY)
    }
}

/// Forward sensor events into the policy mailbox until shutdown.
///
/// Lost events are reported as [`PolicyMessage::SensorsLagged`] so the
/// policy can re-read the items it tracks.
pub(crate) fn spawn_forwarder<I: Item>(
    mut rx: broadcast::Receiver<SensorEvent<I>>,
    handle: PolicyHandle<I>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                event = rx.recv() => match event {
                    Ok(event) => event.into_message(),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Sensor bus lagged");
                        PolicyMessage::SensorsLagged { missed }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Sensor bus closed");
                        break;
                    }
                },
            };

            if handle.send(msg).await.is_err() {
                debug!("Policy stopped, sensor forwarder exiting");
                break;
            }
        }
    })
}

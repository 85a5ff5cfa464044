//! Messages accepted by the policy mailbox.

use sunward_placement::{DemandVector, Location};

use crate::entity::Item;

/// Everything that can change the policy's view or ask for a pass.
///
/// Every message except [`PolicyMessage::RebalanceNow`] is first applied to
/// the model; all of them then mark a pass pending.
#[derive(Debug)]
pub enum PolicyMessage<I: Item> {
    /// A container joined the pool.
    ContainerAdded(I::Container),

    /// A container left the pool.
    ContainerRemoved(I::Container),

    /// An item joined the pool. Its attributes are read on arrival.
    ItemAdded(I),

    /// An item left the pool.
    ItemRemoved(I),

    /// An item is now hosted by `container`, or by nothing.
    ItemMoved {
        item: I,
        container: Option<I::Container>,
    },

    /// An item's demand vector was replaced.
    DemandUpdated {
        item: I,
        demand: Option<DemandVector<I>>,
    },

    /// A container's location changed.
    ContainerLocationUpdated {
        container: I::Container,
        location: Option<Location>,
    },

    /// Sensor events were dropped; re-read every tracked item.
    SensorsLagged { missed: u64 },

    /// Run a pass at the next allowed slot.
    RebalanceNow,
}

impl<I: Item> PolicyMessage<I> {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContainerAdded(_) => "container_added",
            Self::ContainerRemoved(_) => "container_removed",
            Self::ItemAdded(_) => "item_added",
            Self::ItemRemoved(_) => "item_removed",
            Self::ItemMoved { .. } => "item_moved",
            Self::DemandUpdated { .. } => "demand_updated",
            Self::ContainerLocationUpdated { .. } => "container_location_updated",
            Self::SensorsLagged { .. } => "sensors_lagged",
            Self::RebalanceNow => "rebalance_now",
        }
    }
}

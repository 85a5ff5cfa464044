//! Capabilities the policy needs from the managed substrate.
//!
//! The policy never owns items or containers. It holds cloneable handles
//! whose identity is their total order, reads their attributes, and asks
//! items to move.

use std::fmt::{Debug, Display};

use async_trait::async_trait;
use sunward_placement::{DemandVector, Location};

use crate::error::MoveError;

/// Bounds shared by item and container handles.
pub trait Entity: Clone + Ord + Debug + Display + Send + Sync + 'static {}

impl<T> Entity for T where T: Clone + Ord + Debug + Display + Send + Sync + 'static {}

/// A movable unit of work.
#[async_trait]
pub trait Item: Entity {
    /// Where items of this kind are hosted.
    type Container: Container;

    /// Immovable items are never relocated.
    fn is_immovable(&self) -> bool;

    /// The container currently hosting this item, if any.
    fn container(&self) -> Option<Self::Container>;

    /// Latest demand vector, or `None` if nothing has been observed yet.
    fn demand(&self) -> Option<DemandVector<Self>>;

    /// Move the item onto `container`.
    ///
    /// On success the item is hosted by `container`. On failure it stays
    /// where it was.
    async fn move_to(&self, container: &Self::Container) -> Result<(), MoveError>;
}

/// Something that hosts items.
pub trait Container: Entity {
    /// Locations the container declares, most specific first.
    fn locations(&self) -> Vec<Location>;
}

//! Location lookup for containers.

use std::sync::Arc;

use sunward_placement::Location;

use crate::entity::Container;

/// Maps a container to its location.
///
/// `None` means the location is not known yet; the policy asks again on the
/// next periodic tick.
pub type LocationFinder<C> = Arc<dyn Fn(&C) -> Option<Location> + Send + Sync>;

/// The first location a container declares.
pub fn first_declared<C: Container>() -> LocationFinder<C> {
    Arc::new(|container: &C| container.locations().into_iter().next())
}

/// Wrap a closure as a finder.
pub fn from_fn<C, F>(f: F) -> LocationFinder<C>
where
    F: Fn(&C) -> Option<Location> + Send + Sync + 'static,
{
    Arc::new(f)
}

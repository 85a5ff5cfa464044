//! In-memory group.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::entity::Entity;
use crate::pool::{Group, MembershipEvent};

/// Default membership broadcast capacity.
const DEFAULT_CAPACITY: usize = 256;

/// A group whose membership is changed by hand.
pub struct SimGroup<T: Entity> {
    members: Mutex<BTreeSet<T>>,
    tx: broadcast::Sender<MembershipEvent<T>>,
}

impl<T: Entity> SimGroup<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a group whose subscribers lag after `capacity` undelivered events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            members: Mutex::new(BTreeSet::new()),
            tx,
        }
    }

    fn members_mut(&self) -> MutexGuard<'_, BTreeSet<T>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a member. Returns false if it was already present.
    pub fn add(&self, member: T) -> bool {
        let mut members = self.members_mut();
        if !members.insert(member.clone()) {
            return false;
        }
        let _ = self.tx.send(MembershipEvent::Added(member));
        true
    }

    /// Remove a member. Returns false if it was not present.
    pub fn remove(&self, member: &T) -> bool {
        let mut members = self.members_mut();
        if !members.remove(member) {
            return false;
        }
        let _ = self.tx.send(MembershipEvent::Removed(member.clone()));
        true
    }

    pub fn contains(&self, member: &T) -> bool {
        self.members_mut().contains(member)
    }

    pub fn len(&self) -> usize {
        self.members_mut().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members_mut().is_empty()
    }
}

impl<T: Entity> Default for SimGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Group<T> for SimGroup<T> {
    fn members(&self) -> Vec<T> {
        self.members_mut().iter().cloned().collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<MembershipEvent<T>> {
        self.tx.subscribe()
    }
}

//! The pool: a containers group and an items group, seen as one.
//!
//! On attach the pool reports every current member to the policy, then
//! forwards live membership changes. It remembers what it has reported, so
//! duplicate adds and removes never reach the policy, and after a lagged
//! broadcast it re-reads the group and reports only the difference.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entity::{Entity, Item};
use crate::policy::{PolicyHandle, PolicyMessage};

/// A membership change in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent<T> {
    Added(T),
    Removed(T),
}

/// A dynamic set of entities.
pub trait Group<T>: Send + Sync + 'static {
    /// Current members.
    fn members(&self) -> Vec<T>;

    /// Membership changes from now on.
    fn subscribe(&self) -> broadcast::Receiver<MembershipEvent<T>>;
}

/// Containers and items managed together by one policy.
pub struct Pool<I: Item> {
    containers: Arc<dyn Group<I::Container>>,
    items: Arc<dyn Group<I>>,
}

impl<I: Item> Clone for Pool<I> {
    fn clone(&self) -> Self {
        Self {
            containers: Arc::clone(&self.containers),
            items: Arc::clone(&self.items),
        }
    }
}

impl<I: Item> Pool<I> {
    pub fn new(containers: Arc<dyn Group<I::Container>>, items: Arc<dyn Group<I>>) -> Self {
        Self { containers, items }
    }

    /// Current containers.
    pub fn containers(&self) -> Vec<I::Container> {
        self.containers.members()
    }

    /// Current items.
    pub fn items(&self) -> Vec<I> {
        self.items.members()
    }

    /// Start forwarding membership to the policy behind `handle`.
    ///
    /// Containers are reported before items so that items usually arrive
    /// with a resolvable location.
    pub(crate) fn attach(
        &self,
        handle: &PolicyHandle<I>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut containers = Forwarder::new(
            "containers",
            Arc::clone(&self.containers),
            handle.clone(),
            container_message::<I>,
        );
        let mut items = Forwarder::new(
            "items",
            Arc::clone(&self.items),
            handle.clone(),
            item_message::<I>,
        );

        // Both subscriptions exist before either snapshot is read.
        let containers_rx = containers.group.subscribe();
        let items_rx = items.group.subscribe();

        tokio::spawn(async move {
            if !containers.bootstrap().await || !items.bootstrap().await {
                return;
            }
            tokio::join!(
                containers.run(containers_rx, shutdown.clone()),
                items.run(items_rx, shutdown),
            );
        })
    }
}

fn container_message<I: Item>(event: MembershipEvent<I::Container>) -> PolicyMessage<I> {
    match event {
        MembershipEvent::Added(container) => PolicyMessage::ContainerAdded(container),
        MembershipEvent::Removed(container) => PolicyMessage::ContainerRemoved(container),
    }
}

fn item_message<I: Item>(event: MembershipEvent<I>) -> PolicyMessage<I> {
    match event {
        MembershipEvent::Added(item) => PolicyMessage::ItemAdded(item),
        MembershipEvent::Removed(item) => PolicyMessage::ItemRemoved(item),
    }
}

type ToMessage<T, I> = fn(MembershipEvent<T>) -> PolicyMessage<I>;

struct Forwarder<T: Entity, I: Item> {
    name: &'static str,
    group: Arc<dyn Group<T>>,
    handle: PolicyHandle<I>,
    to_message: ToMessage<T, I>,
    known: BTreeSet<T>,
}

impl<T: Entity, I: Item> Forwarder<T, I> {
    fn new(
        name: &'static str,
        group: Arc<dyn Group<T>>,
        handle: PolicyHandle<I>,
        to_message: ToMessage<T, I>,
    ) -> Self {
        Self {
            name,
            group,
            handle,
            to_message,
            known: BTreeSet::new(),
        }
    }

    /// Report every current member. Returns false if the policy is gone.
    async fn bootstrap(&mut self) -> bool {
        let members = self.group.members();
        info!(group = self.name, members = members.len(), "Attaching group");
        for member in members {
            if !self.forward(MembershipEvent::Added(member)).await {
                return false;
            }
        }
        true
    }

    async fn run(
        mut self,
        mut rx: broadcast::Receiver<MembershipEvent<T>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = rx.recv() => {
                    let alive = match event {
                        Ok(event) => self.forward(event).await,
                        Err(RecvError::Lagged(missed)) => {
                            warn!(group = self.name, missed, "Membership events lost, resyncing");
                            self.resync().await
                        }
                        Err(RecvError::Closed) => {
                            debug!(group = self.name, "Group closed");
                            break;
                        }
                    };
                    if !alive {
                        debug!(group = self.name, "Policy stopped, group forwarder exiting");
                        break;
                    }
                }
            }
        }
    }

    /// Forward an event unless it repeats what was already reported.
    ///
    /// Returns false if the policy is gone.
    async fn forward(&mut self, event: MembershipEvent<T>) -> bool {
        let changed = match &event {
            MembershipEvent::Added(member) => self.known.insert(member.clone()),
            MembershipEvent::Removed(member) => self.known.remove(member),
        };
        if !changed {
            return true;
        }
        self.handle.send((self.to_message)(event)).await.is_ok()
    }

    async fn resync(&mut self) -> bool {
        let current: BTreeSet<T> = self.group.members().into_iter().collect();
        let removed: Vec<T> = self.known.difference(&current).cloned().collect();
        let added: Vec<T> = current.difference(&self.known).cloned().collect();

        for member in removed {
            if !self.forward(MembershipEvent::Removed(member)).await {
                return false;
            }
        }
        for member in added {
            if !self.forward(MembershipEvent::Added(member)).await {
                return false;
            }
        }
        true
    }
}

//! Handle for talking to a running policy.

use std::sync::Arc;

use serde::Serialize;
use sunward_id::PolicyId;
use sunward_placement::{ItemDistribution, UsageModel};
use tokio::sync::{mpsc, watch};
use tracing::info;

use super::message::PolicyMessage;
use super::stats::RebalanceStats;
use crate::entity::Item;
use crate::error::PolicyError;

/// Model snapshot published by the policy.
pub type ModelSnapshot<I> = Arc<UsageModel<I, <I as Item>::Container>>;

/// Operating state of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    /// Passes run when pending and allowed by the rate limit.
    Active,
    /// Events are still recorded but no moves are issued.
    Suspended,
}

/// Cloneable handle to a running policy.
pub struct PolicyHandle<I: Item> {
    policy_id: PolicyId,
    tx: mpsc::Sender<PolicyMessage<I>>,
    state: Arc<watch::Sender<PolicyState>>,
    snapshot: watch::Receiver<ModelSnapshot<I>>,
    stats: watch::Receiver<Option<RebalanceStats>>,
}

impl<I: Item> Clone for PolicyHandle<I> {
    fn clone(&self) -> Self {
        Self {
            policy_id: self.policy_id,
            tx: self.tx.clone(),
            state: Arc::clone(&self.state),
            snapshot: self.snapshot.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<I: Item> PolicyHandle<I> {
    pub(crate) fn new(
        policy_id: PolicyId,
        tx: mpsc::Sender<PolicyMessage<I>>,
        state: Arc<watch::Sender<PolicyState>>,
        snapshot: watch::Receiver<ModelSnapshot<I>>,
        stats: watch::Receiver<Option<RebalanceStats>>,
    ) -> Self {
        Self {
            policy_id,
            tx,
            state,
            snapshot,
            stats,
        }
    }

    /// The policy's ID.
    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    /// Send a message, waiting for mailbox space.
    pub async fn send(&self, msg: PolicyMessage<I>) -> Result<(), PolicyError> {
        self.tx.send(msg).await.map_err(|_| PolicyError::Stopped)
    }

    /// Try to send a message without waiting.
    pub fn try_send(&self, msg: PolicyMessage<I>) -> Result<(), PolicyError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PolicyError::MailboxFull,
            mpsc::error::TrySendError::Closed(_) => PolicyError::Stopped,
        })
    }

    /// Ask for a pass at the next allowed slot.
    pub async fn rebalance_now(&self) -> Result<(), PolicyError> {
        self.send(PolicyMessage::RebalanceNow).await
    }

    /// Stop issuing moves. A pass in progress stops before its next move.
    pub fn suspend(&self) {
        if self.set_state(PolicyState::Suspended) {
            info!(policy_id = %self.policy_id, "Policy suspended");
        }
    }

    /// Resume issuing moves. A pass is scheduled for the next allowed slot.
    pub fn resume(&self) {
        if self.set_state(PolicyState::Active) {
            info!(policy_id = %self.policy_id, "Policy resumed");
        }
    }

    fn set_state(&self, next: PolicyState) -> bool {
        self.state.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        })
    }

    /// Current operating state.
    pub fn state(&self) -> PolicyState {
        *self.state.borrow()
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == PolicyState::Suspended
    }

    /// Latest model snapshot.
    pub fn model(&self) -> ModelSnapshot<I> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Watch model snapshots as they are published.
    pub fn subscribe_model(&self) -> watch::Receiver<ModelSnapshot<I>> {
        self.snapshot.clone()
    }

    /// Statistics of the most recent pass, if any has run.
    pub fn last_pass(&self) -> Option<RebalanceStats> {
        self.stats.borrow().clone()
    }

    /// Watch pass statistics as passes complete.
    pub fn subscribe_stats(&self) -> watch::Receiver<Option<RebalanceStats>> {
        self.stats.clone()
    }

    /// Distribution report built from the latest snapshot.
    pub fn item_distribution(&self) -> ItemDistribution {
        self.model().item_distribution()
    }
}

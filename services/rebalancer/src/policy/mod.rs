//! The rebalancing policy.
//!
//! Wires a [`Pool`] and a [`SensorBus`] into a single policy task that keeps
//! the usage model current and relocates items toward their demand.
//!
//! ```text
//!   Pool forwarders ─┐
//!   Sensor forwarder ┼──► mailbox ──► PolicyWorker ──► Item::move_to
//!   PolicyHandle ────┘                   │
//!                                        └──► model / stats snapshots
//! ```

mod handle;
mod message;
mod stats;
mod worker;

use std::sync::Arc;

use sunward_id::PolicyId;
use sunward_placement::{FollowTheSunStrategy, UsageModel};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::error;

pub use handle::{ModelSnapshot, PolicyHandle, PolicyState};
pub use message::PolicyMessage;
pub use stats::RebalanceStats;

use crate::config::PolicyConfig;
use crate::entity::Item;
use crate::error::{ConfigError, PolicyError};
use crate::location::{self, LocationFinder};
use crate::pool::Pool;
use crate::sensors::{self, SensorBus};
use worker::{PolicyWorker, WorkerSettings};

/// A configured, not yet started, rebalancing policy.
pub struct RebalancingPolicy<I: Item> {
    policy_id: PolicyId,
    name: String,
    config: PolicyConfig,
    strategy: FollowTheSunStrategy,
    location_finder: LocationFinder<I::Container>,
}

impl<I: Item> RebalancingPolicy<I> {
    /// Create a policy from a validated configuration.
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        let strategy =
            FollowTheSunStrategy::new(config.parameters.clone()).map_err(ConfigError::from)?;
        let policy_id = PolicyId::new();

        Ok(Self {
            policy_id,
            name: format!("follow-the-sun {policy_id}"),
            config,
            strategy,
            location_finder: location::first_declared(),
        })
    }

    /// Name used for the model and in reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the default first-declared-location finder.
    pub fn with_location_finder(mut self, finder: LocationFinder<I::Container>) -> Self {
        self.location_finder = finder;
        self
    }

    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Spawn the policy task and attach it to `pool` and `sensors`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        self,
        pool: &Pool<I>,
        sensors: &SensorBus<I>,
        shutdown: watch::Receiver<bool>,
    ) -> RunningPolicy<I> {
        let (tx, rx) = mpsc::channel(self.config.mailbox_size);
        let (state_tx, state_rx) = watch::channel(PolicyState::Active);
        let model = UsageModel::new(self.name);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(model.clone()));
        let (stats_tx, stats_rx) = watch::channel(None);

        let handle = PolicyHandle::new(
            self.policy_id,
            tx,
            Arc::new(state_tx),
            snapshot_rx,
            stats_rx,
        );

        let worker = PolicyWorker::new(
            self.policy_id,
            model,
            self.strategy,
            self.location_finder,
            WorkerSettings {
                min_period_between_execs: self.config.min_period_between_execs,
                periodic_interval: self.config.periodic_interval,
                max_batch: self.config.mailbox_size,
            },
            rx,
            state_rx,
            snapshot_tx,
            stats_tx,
        );

        // Subscribe to sensors before the pool snapshot is taken so that no
        // change between the two is missed.
        let sensor_rx = sensors.subscribe();

        let mut tasks = vec![tokio::spawn(worker.run(shutdown.clone()))];
        tasks.push(sensors::spawn_forwarder(sensor_rx, handle.clone(), shutdown.clone()));
        tasks.push(pool.attach(&handle, shutdown));

        RunningPolicy { handle, tasks }
    }
}

/// A started policy and its tasks.
pub struct RunningPolicy<I: Item> {
    handle: PolicyHandle<I>,
    tasks: Vec<JoinHandle<()>>,
}

impl<I: Item> RunningPolicy<I> {
    pub fn handle(&self) -> &PolicyHandle<I> {
        &self.handle
    }

    /// Wait for every task to exit. Signal shutdown first.
    pub async fn join(self) {
        let Self { handle, tasks } = self;
        drop(handle);
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Policy task panicked");
            }
        }
    }

    /// Abort every task without waiting.
    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

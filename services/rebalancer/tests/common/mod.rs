//! Shared harness for rebalancer integration tests.

#![allow(dead_code)]

use std::time::Duration;

use sunward_placement::Location;
use sunward_rebalancer::{
    Item, PolicyConfig, PolicyHandle, RebalancingPolicy, RunningPolicy, SimContainer, SimItem,
    SimWorld,
};
use tokio::sync::watch;

/// How long "nothing happens" assertions watch for.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Passes as often as the periodic timer and the mailbox allow.
pub fn fast_config() -> PolicyConfig {
    PolicyConfig::default()
        .with_min_period_between_execs(Duration::ZERO)
        .with_periodic_interval(Duration::from_millis(20))
}

pub struct Harness {
    pub world: SimWorld,
    policy: Option<RunningPolicy<SimItem>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_world(SimWorld::new())
    }

    pub fn with_world(world: SimWorld) -> Self {
        sunward_testing::init_tracing();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            world,
            policy: None,
            shutdown_tx,
        }
    }

    /// Start a policy with `config` and the default location finder.
    pub fn start(&mut self, config: PolicyConfig) -> PolicyHandle<SimItem> {
        let policy = RebalancingPolicy::new(config).expect("valid config");
        self.start_policy(policy)
    }

    pub fn start_policy(&mut self, policy: RebalancingPolicy<SimItem>) -> PolicyHandle<SimItem> {
        let running = policy.start(
            &self.world.pool(),
            self.world.sensors(),
            self.shutdown_tx.subscribe(),
        );
        let handle = running.handle().clone();
        self.policy = Some(running);
        handle
    }

    pub fn handle(&self) -> &PolicyHandle<SimItem> {
        self.policy.as_ref().expect("policy started").handle()
    }

    /// Where the policy's model thinks `item` is.
    pub fn modelled_location(&self, item: &SimItem) -> Option<Location> {
        self.handle().model().item_location(item).cloned()
    }

    pub fn tracks(&self, item: &SimItem) -> bool {
        self.handle().model().has_item(item)
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(policy) = self.policy.take() {
            policy.join().await;
        }
    }
}

pub fn is_on(item: &SimItem, container: &SimContainer) -> bool {
    item.container().as_ref() == Some(container)
}

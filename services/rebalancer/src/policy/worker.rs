//! The policy task.
//!
//! One task owns the model. Every trigger arrives through the mailbox or one
//! of the timers, is applied to the model, and marks a pass pending. A pending
//! pass starts once the policy is active and at least
//! `min_period_between_execs` has elapsed since the previous pass started, so
//! any number of triggers inside one window collapse into one pass.

use std::sync::Arc;
use std::time::Duration;

use sunward_id::PolicyId;
use sunward_placement::{
    Decision, DemandVector, FailureOutcome, FollowTheSunStrategy, Location, MoveFailures,
    Relocation, StayReason, UsageModel, DEFAULT_FAILURE_WINDOW, DEFAULT_MAX_MOVE_FAILURES,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use super::handle::{ModelSnapshot, PolicyState};
use super::message::PolicyMessage;
use super::stats::RebalanceStats;
use crate::entity::Item;
use crate::location::LocationFinder;

pub(crate) struct WorkerSettings {
    pub min_period_between_execs: Duration,
    pub periodic_interval: Duration,
    /// Most messages applied before the model is republished.
    pub max_batch: usize,
}

pub(crate) struct PolicyWorker<I: Item> {
    policy_id: PolicyId,
    model: UsageModel<I, I::Container>,
    strategy: FollowTheSunStrategy,
    location_finder: LocationFinder<I::Container>,
    settings: WorkerSettings,
    rx: mpsc::Receiver<PolicyMessage<I>>,
    state: watch::Receiver<PolicyState>,
    snapshot: watch::Sender<ModelSnapshot<I>>,
    stats: watch::Sender<Option<RebalanceStats>>,
    failures: MoveFailures<I, I::Container>,
    pending: bool,
    last_pass_started: Option<Instant>,
    passes: u64,
    published: u64,
}

impl<I: Item> PolicyWorker<I> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        policy_id: PolicyId,
        model: UsageModel<I, I::Container>,
        strategy: FollowTheSunStrategy,
        location_finder: LocationFinder<I::Container>,
        settings: WorkerSettings,
        rx: mpsc::Receiver<PolicyMessage<I>>,
        state: watch::Receiver<PolicyState>,
        snapshot: watch::Sender<ModelSnapshot<I>>,
        stats: watch::Sender<Option<RebalanceStats>>,
    ) -> Self {
        Self {
            policy_id,
            model,
            strategy,
            location_finder,
            settings,
            rx,
            state,
            snapshot,
            stats,
            failures: MoveFailures::new(DEFAULT_MAX_MOVE_FAILURES, DEFAULT_FAILURE_WINDOW),
            pending: false,
            last_pass_started: None,
            passes: 0,
            published: 0,
        }
    }

    /// Run until shutdown is signalled or every handle is dropped.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            policy_id = %self.policy_id,
            model = %self.model.name(),
            min_period_ms = self.settings.min_period_between_execs.as_millis() as u64,
            periodic_interval_ms = self.settings.periodic_interval.as_millis() as u64,
            trigger_ratio = self.strategy.params().trigger_ratio,
            min_improvement = self.strategy.params().min_improvement,
            "Starting rebalancing policy"
        );

        let mut ticker = tokio::time::interval(self.settings.periodic_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let ready = self.pending && self.is_active();
            let next_slot = self.next_slot();

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(policy_id = %self.policy_id, "Policy shutting down");
                        break;
                    }
                }
                changed = self.state.changed() => {
                    if changed.is_err() {
                        info!(policy_id = %self.policy_id, "All policy handles dropped");
                        break;
                    }
                    if self.is_active() {
                        ticker.reset();
                        self.pending = true;
                    }
                }
                _ = tokio::time::sleep_until(next_slot), if ready => {
                    self.rebalance().await;
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(msg) => self.handle_batch(msg),
                        None => {
                            info!(policy_id = %self.policy_id, "Policy mailbox closed");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.on_tick();
                }
            }
        }
    }

    fn is_active(&self) -> bool {
        *self.state.borrow() == PolicyState::Active
    }

    fn next_slot(&self) -> Instant {
        match self.last_pass_started {
            Some(started) => started + self.settings.min_period_between_execs,
            None => Instant::now(),
        }
    }

    fn publish_model(&mut self) {
        self.published += 1;
        trace!(policy_id = %self.policy_id, version = self.published, "Publishing model snapshot");
        self.snapshot.send_replace(Arc::new(self.model.clone()));
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// Apply `first` and whatever else is already queued, then publish once.
    fn handle_batch(&mut self, first: PolicyMessage<I>) {
        self.handle(first);
        let mut applied = 1;
        while applied < self.settings.max_batch {
            match self.rx.try_recv() {
                Ok(msg) => self.handle(msg),
                Err(_) => break,
            }
            applied += 1;
        }
        if applied > 1 {
            trace!(policy_id = %self.policy_id, applied, "Applied queued messages");
        }
        self.publish_model();
        self.pending = true;
    }

    fn handle(&mut self, msg: PolicyMessage<I>) {
        trace!(policy_id = %self.policy_id, kind = msg.kind(), "Policy message");

        match msg {
            PolicyMessage::ContainerAdded(container) => self.on_container_added(container),
            PolicyMessage::ContainerRemoved(container) => {
                debug!(container = %container, "Container removed");
                self.model.on_container_removed(&container);
                self.failures.forget_container(&container);
            }
            PolicyMessage::ItemAdded(item) => self.on_item_added(item),
            PolicyMessage::ItemRemoved(item) => {
                debug!(item = %item, "Item removed");
                self.model.on_item_removed(&item);
                self.failures.forget_item(&item);
            }
            PolicyMessage::ItemMoved { item, container } => {
                if !self.model.on_item_moved(&item, container) {
                    trace!(item = %item, "Ignoring move of untracked item");
                }
            }
            PolicyMessage::DemandUpdated { item, demand } => {
                if !self.model.update_item_usage(&item, demand.unwrap_or_default()) {
                    trace!(item = %item, "Ignoring demand of untracked item");
                }
            }
            PolicyMessage::ContainerLocationUpdated { container, location } => {
                self.on_location_updated(container, location)
            }
            PolicyMessage::SensorsLagged { missed } => self.resync(missed),
            PolicyMessage::RebalanceNow => {
                debug!(policy_id = %self.policy_id, "Rebalance requested");
            }
        }
    }

    fn on_container_added(&mut self, container: I::Container) {
        let location = match self.model.container_location(&container) {
            Some(known) => Some(known.clone()),
            None => (self.location_finder)(&container),
        };
        match &location {
            Some(location) => debug!(container = %container, location = %location, "Container added"),
            None => debug!(container = %container, "Container added with unresolved location"),
        }
        self.model.on_container_added(container, location);
    }

    fn on_item_added(&mut self, item: I) {
        let container = item.container();
        let immovable = item.is_immovable();
        debug!(
            item = %item,
            container = ?container,
            immovable,
            "Item added"
        );
        self.model.on_item_added(item.clone(), container, immovable);
        if let Some(demand) = item.demand() {
            self.model.update_item_usage(&item, demand);
        }
    }

    fn on_location_updated(&mut self, container: I::Container, location: Option<Location>) {
        let Some(location) = location.or_else(|| (self.location_finder)(&container)) else {
            trace!(container = %container, "Location still unresolved");
            return;
        };
        debug!(container = %container, location = %location, "Container location updated");
        if !self.model.on_container_location_updated(&container, location) {
            trace!(container = %container, "Ignoring location of untracked container");
        }
    }

    /// Re-read every tracked item after sensor events were lost.
    fn resync(&mut self, missed: u64) {
        warn!(policy_id = %self.policy_id, missed, "Sensor events lost, re-reading items");
        let items: Vec<I> = self.model.items().cloned().collect();
        for item in items {
            self.model.on_item_moved(&item, item.container());
            let demand = item.demand().unwrap_or_else(DemandVector::new);
            self.model.update_item_usage(&item, demand);
        }
    }

    fn on_tick(&mut self) {
        let unresolved: Vec<I::Container> = self.model.unresolved_containers().cloned().collect();
        let mut resolved = 0usize;
        for container in unresolved {
            if let Some(location) = (self.location_finder)(&container) {
                debug!(container = %container, location = %location, "Resolved container location");
                self.model.on_container_location_updated(&container, location);
                resolved += 1;
            }
        }
        if resolved > 0 {
            self.publish_model();
        }

        self.failures.expire(Instant::now().into_std());
        self.pending = true;
    }

    // =========================================================================
    // Pass
    // =========================================================================

    /// Evaluate every tracked item once and issue the moves that pass the
    /// significance margin.
    ///
    /// Decisions read the live model, so each one sees the moves already
    /// made earlier in the same pass.
    #[instrument(skip(self), fields(policy_id = %self.policy_id, pass = self.passes + 1))]
    async fn rebalance(&mut self) {
        let started = Instant::now();
        self.last_pass_started = Some(started);
        self.pending = false;
        self.passes += 1;

        let mut stats = RebalanceStats::start(self.passes);
        let items: Vec<I> = self.model.items().cloned().collect();

        for item in items {
            stats.items_evaluated += 1;
            match self.strategy.decide(&self.model, &item) {
                Decision::Relocate(relocation) => {
                    if !self.is_active() {
                        info!("Policy suspended mid-pass, no further moves");
                        stats.interrupted = true;
                        self.pending = true;
                        break;
                    }
                    self.relocate(&item, relocation, &mut stats).await;
                }
                Decision::Stay(StayReason::Immovable) => stats.skipped_immovable += 1,
                Decision::Stay(StayReason::NoContainer { location }) => {
                    stats.skipped_no_container += 1;
                    debug!(item = %item, location = %location, "No container available in best location");
                }
                Decision::Stay(reason) => {
                    trace!(item = %item, ?reason, "Item stays");
                }
            }
        }

        if stats.moves_issued > 0 {
            self.publish_model();
        }
        stats.exhausted_relocations = self.failures.exhausted();
        stats.duration = started.elapsed();
        if stats.attempted_moves() || stats.interrupted {
            info!(
                items_evaluated = stats.items_evaluated,
                moves_issued = stats.moves_issued,
                moves_failed = stats.moves_failed,
                skipped_immovable = stats.skipped_immovable,
                skipped_no_container = stats.skipped_no_container,
                exhausted_relocations = stats.exhausted_relocations,
                interrupted = stats.interrupted,
                duration_ms = stats.duration.as_millis() as u64,
                "Rebalance pass complete"
            );
        } else {
            debug!(
                items_evaluated = stats.items_evaluated,
                skipped_immovable = stats.skipped_immovable,
                "Rebalance pass complete, nothing to move"
            );
        }
        self.stats.send_replace(Some(stats));
    }

    async fn relocate(
        &mut self,
        item: &I,
        relocation: Relocation<I::Container>,
        stats: &mut RebalanceStats,
    ) {
        info!(
            item = %item,
            from = %relocation.from,
            to = %relocation.to,
            container = %relocation.container,
            current_weight = relocation.current_weight,
            best_weight = relocation.best_weight,
            "Relocating item"
        );

        match item.move_to(&relocation.container).await {
            Ok(()) => {
                self.model.on_item_moved(item, Some(relocation.container));
                self.failures.forget_item(item);
                stats.moves_issued += 1;
            }
            Err(e) => {
                stats.moves_failed += 1;
                match self.failures.record(item, &relocation.container) {
                    FailureOutcome::Exhausted { attempts } => error!(
                        item = %item,
                        container = %relocation.container,
                        attempts,
                        error = %e,
                        "Relocation keeps failing"
                    ),
                    FailureOutcome::Retrying { attempts } => warn!(
                        item = %item,
                        container = %relocation.container,
                        attempts,
                        error = %e,
                        "Relocation failed, will retry next pass"
                    ),
                }
            }
        }
    }
}

//! sunward rebalancer demo
//!
//! Runs the follow-the-sun policy against a simulated substrate: one
//! container per region, an immovable gateway in each, and a handful of
//! movable session items. Demand shifts from region to region as the "sun"
//! moves, and the sessions follow it.
//!
//! Configuration comes from `SUNWARD_*` environment variables; see
//! [`PolicyConfig::from_env`].

use std::time::Duration;

use anyhow::Result;
use sunward_placement::Location;
use sunward_rebalancer::{PolicyConfig, PolicyHandle, RebalancingPolicy, SimItem, SimWorld};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Regions in the order the sun visits them.
const REGIONS: [&str; 3] = ["ap-south", "eu-west", "us-east"];

const SESSIONS: usize = 4;

const ROUNDS: usize = 2;

/// Demand toward the gateway whose region is in daylight.
const DAYLIGHT_DEMAND: f64 = 100.0;

/// Background demand toward every other gateway.
const NIGHT_DEMAND: f64 = 5.0;

#[tokio::main]
async fn main() -> Result<()> {
    let config = PolicyConfig::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting sunward rebalancer demo");
    info!(
        min_period_ms = config.min_period_between_execs.as_millis() as u64,
        periodic_interval_ms = config.periodic_interval.as_millis() as u64,
        trigger_ratio = config.parameters.trigger_ratio,
        min_improvement = config.parameters.min_improvement,
        excluded_locations = ?config.parameters.excluded_locations,
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let world = SimWorld::new();
    let scenario = Scenario::build(&world);

    let policy = RebalancingPolicy::new(config.clone())?
        .with_name("sunward demo")
        .start(&world.pool(), world.sensors(), shutdown_rx);
    let handle = policy.handle().clone();

    // One pass per phase, plus slack for the move notifications.
    let phase = config.min_period_between_execs + Duration::from_millis(500);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = scenario.run(&handle, phase) => {
            match result {
                Ok(()) => info!("Scenario complete"),
                Err(e) => error!(error = %e, "Scenario failed"),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    info!("Waiting for policy to shut down...");
    policy.join().await;

    println!("{}", handle.item_distribution());
    info!("Rebalancer shutdown complete");
    Ok(())
}

struct Scenario {
    /// (region, immovable gateway) pairs.
    gateways: Vec<(Location, SimItem)>,
    sessions: Vec<SimItem>,
}

impl Scenario {
    fn build(world: &SimWorld) -> Self {
        let gateways: Vec<(Location, SimItem)> = REGIONS
            .iter()
            .map(|region| {
                let container = world.add_container(&format!("node-{region}"), *region);
                let gateway = world.add_immovable_item(&format!("gw-{region}"), &container);
                (Location::new(*region), gateway)
            })
            .collect();

        let first = world
            .pool()
            .containers()
            .into_iter()
            .min_by(|a, b| a.name().cmp(b.name()));
        let sessions = (0..SESSIONS)
            .map(|n| match &first {
                Some(container) => world.add_item(&format!("session-{n}"), container),
                None => world.add_item_unplaced(&format!("session-{n}")),
            })
            .collect();

        Self { gateways, sessions }
    }

    async fn run(&self, handle: &PolicyHandle<SimItem>, phase: Duration) -> Result<()> {
        for round in 1..=ROUNDS {
            for (daylight, _) in &self.gateways {
                info!(round, region = %daylight, "Sun rises");

                for session in &self.sessions {
                    session.set_demand(self.gateways.iter().map(|(region, gateway)| {
                        let weight = if region == daylight { DAYLIGHT_DEMAND } else { NIGHT_DEMAND };
                        (gateway.clone(), weight)
                    }));
                }
                handle.rebalance_now().await?;
                tokio::time::sleep(phase).await;

                let report = handle.item_distribution();
                info!(
                    round,
                    region = %daylight,
                    last_pass = ?handle.last_pass(),
                    distribution = %serde_json::to_string(&report)?,
                    "Distribution after phase"
                );
            }
        }
        Ok(())
    }
}

//! Follow-the-sun rebalancer.
//!
//! A rebalancing policy watches a pool of containers and items, keeps a usage
//! model of who talks to whom and where everyone runs, and moves movable
//! items toward the location their demand comes from.
//!
//! ## Architecture
//!
//! - **Pool**: a containers group and an items group, forwarded as membership messages
//! - **Sensor bus**: demand, placement and location changes published by the substrate
//! - **Policy**: a single task owning the model; rate-limited, coalescing passes
//! - **Location finder**: pluggable container-to-location lookup
//! - **Sim**: in-memory substrate for tests and the demo binary
//!
//! ## Example
//!
//! ```no_run
//! use sunward_rebalancer::{PolicyConfig, RebalancingPolicy, SimWorld};
//! use tokio::sync::watch;
//!
//! # async fn demo() -> Result<(), sunward_rebalancer::PolicyError> {
//! let world = SimWorld::new();
//! let a = world.add_container("A", "us-east");
//! let b = world.add_container("B", "eu-west");
//! let client = world.add_item("client", &a);
//! let server = world.add_item("server", &b);
//! client.set_demand([(server.clone(), 100.0)]);
//!
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! let policy = RebalancingPolicy::new(PolicyConfig::default())?
//!     .start(&world.pool(), world.sensors(), shutdown_rx);
//! println!("{}", policy.handle().item_distribution());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod location;
pub mod policy;
pub mod pool;
pub mod sensors;
pub mod sim;

pub use config::PolicyConfig;
pub use entity::{Container, Entity, Item};
pub use error::{ConfigError, MoveError, PolicyError};
pub use location::LocationFinder;
pub use policy::{
    ModelSnapshot, PolicyHandle, PolicyMessage, PolicyState, RebalanceStats, RebalancingPolicy,
    RunningPolicy,
};
pub use pool::{Group, MembershipEvent, Pool};
pub use sensors::{SensorBus, SensorEvent};
pub use sim::{SimContainer, SimGroup, SimItem, SimWorld};

//! # sunward-id
//!
//! Typed identifiers used by the sunward rebalancer and its simulated
//! substrate.
//!
//! The placement core is generic over item and container identity, so these
//! types are only one possible choice of key. They are what the simulated
//! substrate, the demo binary and the integration tests use.
//!
//! ## ID Format
//!
//! All IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! - `item_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `ctr_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `pol_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! ULIDs are time-ordered, which gives every ID a stable total order. The
//! placement core relies on that order for deterministic iteration and
//! tie-breaking.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;

//! Typed ID definitions.

use crate::define_id;

// =============================================================================
// Placement
// =============================================================================

define_id!(ItemId, "item");
define_id!(ContainerId, "ctr");

// =============================================================================
// Control loop
// =============================================================================

define_id!(PolicyId, "pol");

// =============================================================================
// Tests
// =============================================================================

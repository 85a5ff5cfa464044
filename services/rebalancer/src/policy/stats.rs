//! Per-pass statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of one rebalance pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebalanceStats {
    /// Sequence number, starting at 1.
    pub pass: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub items_evaluated: usize,
    pub moves_issued: usize,
    pub moves_failed: usize,
    pub skipped_immovable: usize,
    pub skipped_no_container: usize,
    /// Item and target pairs whose moves kept failing within the failure window.
    pub exhausted_relocations: usize,
    /// The policy was suspended before the pass finished.
    pub interrupted: bool,
}

impl RebalanceStats {
    pub(crate) fn start(pass: u64) -> Self {
        Self {
            pass,
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Returns true if the pass attempted any move.
    pub fn attempted_moves(&self) -> bool {
        self.moves_issued + self.moves_failed > 0
    }
}

//! Bookkeeping for relocations that keep failing.
//!
//! Failures are counted per item and target container: an item that cannot
//! reach one container may still reach another. Counting only escalates how
//! loudly a failure is reported. It never suppresses the next attempt.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Default number of failed moves toward one container before escalating.
pub const DEFAULT_MAX_MOVE_FAILURES: u32 = 3;

/// Default window in which failures accumulate.
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// How a recorded failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still within the tolerated number of attempts.
    Retrying { attempts: u32 },
    /// More than the tolerated number of attempts inside the window.
    Exhausted { attempts: u32 },
}

impl FailureOutcome {
    pub fn attempts(&self) -> u32 {
        match *self {
            Self::Retrying { attempts } | Self::Exhausted { attempts } => attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct FailureRun {
    attempts: u32,
    since: Instant,
}

/// Failed relocations keyed by `(item, target container)`.
#[derive(Debug, Clone)]
pub struct MoveFailures<I: Ord, C: Ord> {
    max_failures: u32,
    window: Duration,
    runs: BTreeMap<(I, C), FailureRun>,
}

impl<I: Ord + Clone, C: Ord + Clone> MoveFailures<I, C> {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            max_failures,
            window,
            runs: BTreeMap::new(),
        }
    }

    /// Record a failed move of `item` toward `target`.
    pub fn record(&mut self, item: &I, target: &C) -> FailureOutcome {
        self.record_at(item, target, Instant::now())
    }

    /// Like [`record`](Self::record) with an explicit clock reading.
    pub fn record_at(&mut self, item: &I, target: &C, now: Instant) -> FailureOutcome {
        let run = self
            .runs
            .entry((item.clone(), target.clone()))
            .or_insert(FailureRun { attempts: 0, since: now });

        if now.saturating_duration_since(run.since) > self.window {
            *run = FailureRun { attempts: 0, since: now };
        }
        run.attempts += 1;

        if run.attempts > self.max_failures {
            FailureOutcome::Exhausted { attempts: run.attempts }
        } else {
            FailureOutcome::Retrying { attempts: run.attempts }
        }
    }

    /// Failed attempts of `item` toward `target` in the current window.
    pub fn attempts(&self, item: &I, target: &C) -> u32 {
        self.runs
            .get(&(item.clone(), target.clone()))
            .map_or(0, |run| run.attempts)
    }

    /// Forget every failure of `item`, after it moved or left the pool.
    pub fn forget_item(&mut self, item: &I) {
        self.runs.retain(|(failed, _), _| failed != item);
    }

    /// Forget every failure toward `container`, after it left the pool.
    pub fn forget_container(&mut self, container: &C) {
        self.runs.retain(|(_, target), _| target != container);
    }

    /// Drop runs whose window has passed.
    pub fn expire(&mut self, now: Instant) {
        let window = self.window;
        self.runs
            .retain(|_, run| now.saturating_duration_since(run.since) <= window);
    }

    /// Number of `(item, target)` pairs currently past the tolerated attempts.
    pub fn exhausted(&self) -> usize {
        self.runs
            .values()
            .filter(|run| run.attempts > self.max_failures)
            .count()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl<I: Ord + Clone, C: Ord + Clone> Default for MoveFailures<I, C> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MOVE_FAILURES, DEFAULT_FAILURE_WINDOW)
    }
}

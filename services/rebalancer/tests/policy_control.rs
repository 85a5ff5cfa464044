//! Rate limiting, suspension and move failures.

mod common;

use std::time::Duration;

use common::{fast_config, is_on, Harness, QUIET_PERIOD};
use sunward_placement::Location;
use sunward_rebalancer::{PolicyState, SimContainer, SimItem};
use sunward_testing::{consistently, eventually, DEFAULT_TIMEOUT};

/// Scheduling slack allowed when comparing wall-clock gaps.
const TIMER_TOLERANCE: Duration = Duration::from_millis(100);

fn setup(harness: &Harness) -> (SimContainer, SimContainer, SimItem, SimItem) {
    let a = harness.world.add_container("A", "loc1");
    let b = harness.world.add_container("B", "loc2");
    let item1 = harness.world.add_item("1", &a);
    let item2 = harness.world.add_item("2", &b);
    (a, b, item1, item2)
}

#[tokio::test]
async fn test_respects_min_period_between_execs() {
    let min_period = Duration::from_millis(1000);
    let mut harness = Harness::new();
    let (a, b, item1, item2) = setup(&harness);
    let item3 = harness.world.add_item("3", &a);
    harness.start(
        fast_config()
            .with_min_period_between_execs(min_period)
            .with_periodic_interval(Duration::from_millis(50)),
    );

    item1.set_demand([(item2.clone(), 100.0)]);
    eventually(DEFAULT_TIMEOUT, "item1 moves to B", || is_on(&item1, &b)).await;

    item1.set_demand([(item3.clone(), 100.0)]);
    eventually(DEFAULT_TIMEOUT, "item1 moves back to A", || is_on(&item1, &a)).await;

    let moves = item1.moves();
    assert_eq!(moves.len(), 2);
    let gap = moves[1].at.duration_since(moves[0].at);
    assert!(
        gap + TIMER_TOLERANCE >= min_period,
        "moves only {gap:?} apart, expected at least {min_period:?}"
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_dependent_moves_land_in_one_pass() {
    let min_period = Duration::from_millis(1000);
    let mut harness = Harness::new();
    let a = harness.world.add_container("A", "loc1");
    let b = harness.world.add_container("B", "loc2");
    let x = harness.world.add_item("x", &a);
    let y = harness.world.add_item("y", &a);
    let target = harness.world.add_item("target", &b);
    // Passes visit items in key order: the leader is evaluated first.
    let (leader, follower) = if x < y { (x, y) } else { (y, x) };
    let handle = harness.start(fast_config().with_min_period_between_execs(min_period));

    eventually(DEFAULT_TIMEOUT, "items tracked", || handle.model().item_count() == 3).await;
    let mut passes = handle.subscribe_stats();
    follower.set_demand([(leader.clone(), 100.0)]);
    leader.set_demand([(target.clone(), 100.0)]);

    let moving_pass = tokio::time::timeout(DEFAULT_TIMEOUT, async {
        loop {
            passes.changed().await.expect("policy running");
            let latest = passes.borrow_and_update().clone();
            if let Some(stats) = latest.filter(|stats| stats.attempted_moves()) {
                return stats;
            }
        }
    })
    .await
    .expect("a pass moved items");

    assert_eq!(moving_pass.moves_issued, 2);
    assert!(moving_pass.moves_issued <= moving_pass.items_evaluated);
    assert!(is_on(&leader, &b));
    assert!(is_on(&follower, &b));
    assert_eq!(leader.moves().len(), 1);
    assert_eq!(follower.moves().len(), 1);
    assert!(target.moves().is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_triggers_coalesce_into_one_pass_per_window() {
    let min_period = Duration::from_millis(500);
    let mut harness = Harness::new();
    let (_a, _b, item1, item2) = setup(&harness);
    let handle = harness.start(fast_config().with_min_period_between_execs(min_period));

    eventually(DEFAULT_TIMEOUT, "first pass", || handle.last_pass().is_some()).await;
    let before = handle.last_pass().map_or(0, |stats| stats.pass);
    let started = tokio::time::Instant::now();

    for n in 0..50 {
        item1.set_demand([(item2.clone(), 0.01 * f64::from(n))]);
        handle.rebalance_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let elapsed = started.elapsed();
    let after = handle.last_pass().map_or(0, |stats| stats.pass);
    // One pass per window, plus the windows straddling either end.
    let allowed = (elapsed.as_millis() / min_period.as_millis()) as u64 + 2;
    assert!(
        after - before <= allowed,
        "{} passes in {elapsed:?}, at most {allowed} allowed",
        after - before
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_suspended_policy_issues_no_moves() {
    let mut harness = Harness::new();
    let (a, b, item1, item2) = setup(&harness);
    let handle = harness.start(fast_config());

    handle.suspend();
    assert_eq!(handle.state(), PolicyState::Suspended);

    item1.set_demand([(item2.clone(), 100.0)]);
    eventually(DEFAULT_TIMEOUT, "demand still recorded while suspended", || {
        handle.model().item_demand(&item1).is_some_and(|d| !d.is_empty())
    })
    .await;
    consistently(QUIET_PERIOD, "item1 stays in A", || is_on(&item1, &a)).await;

    handle.resume();
    assert_eq!(handle.state(), PolicyState::Active);
    eventually(DEFAULT_TIMEOUT, "item1 moves after resume", || is_on(&item1, &b)).await;

    harness.shutdown().await;
}

#[tokio::test]
async fn test_suspend_stops_pass_before_next_move() {
    let mut harness = Harness::new();
    let a = harness.world.add_container("A", "loc1");
    let b = harness.world.add_container("B", "loc2");
    let item1 = harness.world.add_item("1", &a);
    let item2 = harness.world.add_item("2", &a);
    let target = harness.world.add_item("target", &b);
    for item in [&item1, &item2] {
        item.set_move_delay(Some(Duration::from_millis(300)));
    }
    let handle = harness.start(fast_config());
    eventually(DEFAULT_TIMEOUT, "items tracked", || {
        harness.tracks(&item1) && harness.tracks(&item2) && harness.tracks(&target)
    })
    .await;

    item1.set_demand([(target.clone(), 100.0)]);
    item2.set_demand([(target.clone(), 100.0)]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.suspend();

    let moved = || [&item1, &item2].iter().filter(|item| is_on(item, &b)).count();
    eventually(DEFAULT_TIMEOUT, "the in-flight move completes", || moved() == 1).await;
    consistently(Duration::from_millis(500), "no further moves", || moved() == 1).await;

    handle.resume();
    eventually(DEFAULT_TIMEOUT, "both items reach B", || moved() == 2).await;

    harness.shutdown().await;
}

#[tokio::test]
async fn test_failed_move_leaves_model_untouched() {
    let mut harness = Harness::new();
    let (a, b, item1, item2) = setup(&harness);
    item1.fail_moves(true);
    let handle = harness.start(fast_config());

    item1.set_demand([(item2.clone(), 100.0)]);

    eventually(DEFAULT_TIMEOUT, "a move failed", || {
        handle.last_pass().is_some_and(|stats| stats.moves_failed >= 1)
    })
    .await;
    assert!(is_on(&item1, &a));
    assert_eq!(harness.modelled_location(&item1), Some(Location::new("loc1")));

    item1.fail_moves(false);
    eventually(DEFAULT_TIMEOUT, "move retried on a later pass", || is_on(&item1, &b)).await;

    harness.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_policy() {
    let mut harness = Harness::new();
    let (_a, _b, _item1, _item2) = setup(&harness);
    let handle = harness.start(fast_config());

    eventually(DEFAULT_TIMEOUT, "first pass", || handle.last_pass().is_some()).await;
    harness.shutdown().await;

    assert!(handle.rebalance_now().await.is_err());
}

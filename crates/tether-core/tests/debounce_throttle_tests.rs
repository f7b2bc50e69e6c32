//! Debounce and throttle integration tests: burst collapsing, argument
//! selection, per-name independence, and cancellation.

mod common;

use std::sync::Arc;

use serde_json::json;
use tether_core::simulation::SimOwner;
use tether_core::{Error, Owner, OwnerHandle};

use common::rig;

fn as_handle(owner: &Arc<SimOwner>) -> OwnerHandle {
    Arc::clone(owner) as OwnerHandle
}

#[test]
fn debounce_burst_collapses_to_latest_arguments() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("save");
    let handle = as_handle(&owner);

    rig.binder
        .debounce_task(&handle, "save", vec![json!("a1"), json!(40)])
        .unwrap();
    rig.binder
        .debounce_task(&handle, "save", vec![json!("a2"), json!(40)])
        .unwrap();
    rig.binder
        .debounce_task(&handle, "save", vec![json!("a3"), json!(40)])
        .unwrap();

    rig.scheduler.advance(40);
    let calls = owner.calls();
    assert_eq!(calls.len(), 1, "exactly one invocation for the burst");
    assert_eq!(calls[0].1, vec![json!("a3")]);

    let metrics = rig.binder.metrics();
    assert_eq!(metrics.debounces_armed, 3);
    assert_eq!(metrics.debounces_coalesced, 2);
    assert_eq!(metrics.debounces_fired, 1);
}

#[test]
fn debounce_window_restarts_from_the_most_recent_call() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("save");
    let handle = as_handle(&owner);

    rig.binder
        .debounce_task(&handle, "save", vec![json!(1), json!(50)])
        .unwrap();
    rig.scheduler.advance(30);
    rig.binder
        .debounce_task(&handle, "save", vec![json!(2), json!(50)])
        .unwrap();

    rig.scheduler.advance(40);
    assert_eq!(owner.call_count(), 0, "trailing edge waits out the rearm");
    rig.scheduler.advance(10);
    let calls = owner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, vec![json!(2)]);
}

#[test]
fn debounce_entry_is_gone_once_it_fires() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("save");
    let handle = as_handle(&owner);

    rig.binder
        .debounce_task(&handle, "save", vec![json!(25)])
        .unwrap();
    let pending = rig.binder.owner_snapshot(owner.owner_id()).unwrap();
    assert_eq!(pending.pending_debounces, vec!["save".to_string()]);

    rig.scheduler.advance(25);
    let after = rig.binder.owner_snapshot(owner.owner_id()).unwrap();
    assert!(after.pending_debounces.is_empty());

    // A fresh burst after the fire starts a fresh entry.
    rig.binder
        .debounce_task(&handle, "save", vec![json!(25)])
        .unwrap();
    rig.scheduler.advance(25);
    assert_eq!(owner.call_count(), 2);
}

#[test]
fn debounces_are_independent_per_name() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("save");
    owner.record_task("poll");
    let handle = as_handle(&owner);

    rig.binder
        .debounce_task(&handle, "save", vec![json!("s"), json!(20)])
        .unwrap();
    rig.binder
        .debounce_task(&handle, "poll", vec![json!("p"), json!(20)])
        .unwrap();

    rig.scheduler.advance(20);
    let calls = owner.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().any(|(name, args)| name == "save" && args == &vec![json!("s")]));
    assert!(calls.iter().any(|(name, args)| name == "poll" && args == &vec![json!("p")]));
}

#[test]
fn cancel_debounce_suppresses_the_pending_invocation() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("save");
    let handle = as_handle(&owner);

    rig.binder
        .debounce_task(&handle, "save", vec![json!(30)])
        .unwrap();
    rig.binder.cancel_debounce(owner.owner_id(), "save");

    rig.scheduler.advance(1000);
    assert_eq!(owner.call_count(), 0);
    assert_eq!(rig.binder.metrics().debounces_cancelled, 1);
}

#[test]
fn cancel_debounce_is_a_no_op_when_nothing_is_pending() {
    let rig = rig();
    let owner = SimOwner::new();

    // No record for the owner at all.
    rig.binder.cancel_debounce(owner.owner_id(), "save");

    owner.record_task("save");
    rig.binder
        .debounce_task(&as_handle(&owner), "save", vec![json!(10)])
        .unwrap();
    rig.scheduler.advance(10);

    // Entry already fired; cancelling again must not error or count.
    rig.binder.cancel_debounce(owner.owner_id(), "save");
    assert_eq!(rig.binder.metrics().debounces_cancelled, 0);
}

#[test]
fn throttle_burst_uses_first_arguments_only() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("do_stuff");
    let handle = as_handle(&owner);

    let first = rig
        .binder
        .throttle_task(&handle, "do_stuff", vec![json!("a1"), json!(60)])
        .unwrap();
    let second = rig
        .binder
        .throttle_task(&handle, "do_stuff", vec![json!("a2"), json!(60)])
        .unwrap();
    let third = rig
        .binder
        .throttle_task(&handle, "do_stuff", vec![json!("a3"), json!(60)])
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, third);

    let calls = owner.calls();
    assert_eq!(calls.len(), 1, "exactly one invocation for the burst");
    assert_eq!(calls[0].1, vec![json!("a1")]);

    let metrics = rig.binder.metrics();
    assert_eq!(metrics.throttles_started, 1);
    assert_eq!(metrics.throttles_suppressed, 2);
}

#[test]
fn throttle_reopens_after_the_window_expires() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("do_stuff");
    let handle = as_handle(&owner);

    let first = rig
        .binder
        .throttle_task(&handle, "do_stuff", vec![json!("a"), json!(50)])
        .unwrap();
    rig.scheduler.advance(50);
    let second = rig
        .binder
        .throttle_task(&handle, "do_stuff", vec![json!("b"), json!(50)])
        .unwrap();

    assert_ne!(first, second);
    let calls = owner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, vec![json!("a")]);
    assert_eq!(calls[1].1, vec![json!("b")]);
}

#[test]
fn cancel_throttle_closes_the_window_early() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("do_stuff");
    let handle = as_handle(&owner);

    rig.binder
        .throttle_task(&handle, "do_stuff", vec![json!("a"), json!(100)])
        .unwrap();
    rig.binder.cancel_throttle(owner.owner_id(), "do_stuff");

    // The window is gone, so the next call leads again immediately.
    rig.binder
        .throttle_task(&handle, "do_stuff", vec![json!("b"), json!(100)])
        .unwrap();
    let calls = owner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].1, vec![json!("b")]);
}

#[test]
fn non_integer_trailing_wait_is_rejected_before_anything_runs() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("do_stuff");
    let handle = as_handle(&owner);

    let err = rig
        .binder
        .throttle_task(&handle, "do_stuff", vec![json!("bad")])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDelay { .. }));
    assert_eq!(owner.call_count(), 0, "leading edge must not run");
    assert_eq!(rig.scheduler.pending_count(), 0);

    let err = rig
        .binder
        .debounce_task(&handle, "do_stuff", vec![json!(1.5)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDelay { .. }));

    let err = rig
        .binder
        .debounce_task(&handle, "do_stuff", vec![])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidDelay { .. }));
}

#[test]
fn debounce_of_an_unknown_name_is_rejected() {
    let rig = rig();
    let owner = SimOwner::new();

    let err = rig
        .binder
        .debounce_task(&as_handle(&owner), "missing", vec![json!(10)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTask { name, .. } if name == "missing"));
    assert_eq!(rig.scheduler.pending_count(), 0);
}

#[test]
fn debounce_and_throttle_reject_destroyed_owners() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("save");
    owner.mark_destroyed();
    let handle = as_handle(&owner);

    assert!(matches!(
        rig.binder
            .debounce_task(&handle, "save", vec![json!(10)])
            .unwrap_err(),
        Error::DestroyedOwner { .. }
    ));
    assert!(matches!(
        rig.binder
            .throttle_task(&handle, "save", vec![json!(10)])
            .unwrap_err(),
        Error::DestroyedOwner { .. }
    ));
}

#[test]
fn sweep_cancels_open_throttle_windows() {
    let rig = rig();
    let owner = SimOwner::new();
    owner.record_task("do_stuff");
    let handle = as_handle(&owner);

    rig.binder
        .throttle_task(&handle, "do_stuff", vec![json!("a"), json!(500)])
        .unwrap();
    assert_eq!(owner.call_count(), 1, "leading edge ran");

    owner.destroy(&rig.host);
    let metrics = rig.binder.metrics();
    assert_eq!(metrics.swept_throttles, 1);
    assert!(rig.binder.owner_snapshot(owner.owner_id()).is_none());
}

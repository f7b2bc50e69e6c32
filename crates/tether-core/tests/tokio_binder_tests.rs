//! End-to-end tests of the binder over the tokio-backed primitive
//! scheduler, under paused virtual time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tether_core::binder::BinderConfig;
use tether_core::registry::StrongOwnerStore;
use tether_core::runtime::TokioScheduler;
use tether_core::simulation::{ManualHost, SimOwner};
use tether_core::{LifecycleHost, Owner, OwnerHandle, PrimitiveScheduler, TaskBinder};

struct TokioRig {
    scheduler: TokioScheduler,
    host: Arc<ManualHost>,
    binder: TaskBinder,
}

fn tokio_rig() -> TokioRig {
    let scheduler = TokioScheduler::new();
    let host = Arc::new(ManualHost::new());
    let binder = TaskBinder::with_store(
        Arc::new(scheduler.clone()) as Arc<dyn PrimitiveScheduler>,
        Arc::clone(&host) as Arc<dyn LifecycleHost>,
        BinderConfig::default(),
        Box::new(StrongOwnerStore::new()),
    );
    TokioRig {
        scheduler,
        host,
        binder,
    }
}

fn as_handle(owner: &Arc<SimOwner>) -> OwnerHandle {
    Arc::clone(owner) as OwnerHandle
}

#[tokio::test(start_paused = true)]
async fn delayed_task_fires_under_virtual_time() {
    let rig = tokio_rig();
    let owner = SimOwner::new();
    owner.record_task("tick");

    rig.binder.run_task(&as_handle(&owner), "tick", 25).unwrap();
    assert_eq!(owner.call_count(), 0);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(owner.call_count(), 1);
    assert_eq!(
        rig.binder
            .owner_snapshot(owner.owner_id())
            .unwrap()
            .tracked_timers,
        0
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_before_fire_suppresses_execution() {
    let rig = tokio_rig();
    let owner = SimOwner::new();
    owner.record_task("tick");

    let id = rig.binder.run_task(&as_handle(&owner), "tick", 25).unwrap();
    rig.binder.cancel_task(owner.owner_id(), id);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(owner.call_count(), 0);
    assert_eq!(rig.scheduler.pending_delayed(), 0);
}

#[tokio::test(start_paused = true)]
async fn debounce_burst_collapses_over_tokio_time() {
    let rig = tokio_rig();
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

    tokio::time::sleep(Duration::from_millis(60)).await;
    let calls = owner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, vec![json!("a3")]);
}

#[tokio::test(start_paused = true)]
async fn destruction_sweep_stops_everything_in_flight() {
    let rig = tokio_rig();
    let owner = SimOwner::new();
    owner.record_task("tick");
    owner.record_task("save");
    let handle = as_handle(&owner);

    rig.binder.run_task(&handle, "tick", 50).unwrap();
    rig.binder.run_task(&handle, "tick", 80).unwrap();
    rig.binder
        .debounce_task(&handle, "save", vec![json!(60)])
        .unwrap();

    owner.destroy(&rig.host);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(owner.call_count(), 0);
    let metrics = rig.binder.metrics();
    assert_eq!(metrics.destruction_sweeps, 1);
    assert_eq!(metrics.swept_timers, 2);
    assert_eq!(metrics.swept_debounces, 1);
}

#[tokio::test(start_paused = true)]
async fn queued_work_stays_fifo_and_cancellable() {
    let rig = tokio_rig();
    let owner = SimOwner::new();
    owner.record_task("step");
    let handle = as_handle(&owner);

    rig.binder
        .schedule_task(&handle, "actions", "step", vec![json!(1)])
        .unwrap();
    let dropped = rig
        .binder
        .schedule_task(&handle, "actions", "step", vec![json!(2)])
        .unwrap();
    rig.binder
        .schedule_task(&handle, "actions", "step", vec![json!(3)])
        .unwrap();
    rig.binder.cancel_task(owner.owner_id(), dropped);

    tokio::time::sleep(Duration::from_millis(1)).await;
    let order: Vec<_> = owner.calls().into_iter().map(|(_, args)| args).collect();
    assert_eq!(order, vec![vec![json!(1)], vec![json!(3)]]);
}

//! The dispatch façade: lifecycle-bound scheduling over a primitive
//! scheduler.
//!
//! [`TaskBinder`] owns the per-owner task registry and the
//! cancellation-safe dispatch protocol:
//! - plain delayed tasks (`run_task`) and queued tasks (`schedule_task`)
//!   are recorded in the owner's timer set and self-remove when they fire
//! - debounce/throttle calls coalesce per `(owner, name)`, reusing one
//!   wrapped callable per burst so the primitive scheduler recognizes the
//!   burst as a single operation
//! - the destruction hook registered with the host cancels everything
//!   outstanding, exactly once, when the owner dies
//!
//! Lock discipline: the binder never invokes user callbacks or the
//! primitive scheduler while holding a record lock or the metrics lock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::owner::{LifecycleHost, Owner, OwnerHandle, OwnerId};
use crate::registry::{
    DebounceEntry, OwnerStore, RecordHandle, ThrottleEntry, TimerSlot, WeakOwnerStore,
};
use crate::scheduler::{CoalesceKey, PrimitiveScheduler, TimerId};
use crate::task::{self, Task, TaskArgs, TaskFn};

/// Queue reserved for the host's post-render work by default.
pub const DEFAULT_RESERVED_QUEUE: &str = "after_render";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the dispatch façade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Queue names that `schedule_task` refuses to target.
    pub reserved_queues: Vec<String>,
    /// Emit a `tracing` warning when the deprecated unowned cancel runs.
    pub warn_on_unowned_cancel: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            reserved_queues: vec![DEFAULT_RESERVED_QUEUE.to_string()],
            warn_on_unowned_cancel: true,
        }
    }
}

// =============================================================================
// Metrics & snapshots
// =============================================================================

/// Binder metrics for observability and triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BinderMetrics {
    /// Plain delayed tasks accepted.
    pub timers_scheduled: u64,
    /// Queue tasks accepted.
    pub queue_tasks_scheduled: u64,
    /// Plain/queued tasks that fired.
    pub timers_fired: u64,
    /// Tracked timers cancelled through `cancel_task`.
    pub timers_cancelled: u64,
    /// Debounce calls accepted.
    pub debounces_armed: u64,
    /// Debounce calls that collapsed into an existing pending entry.
    pub debounces_coalesced: u64,
    /// Debounce entries that fired.
    pub debounces_fired: u64,
    /// Debounce entries cancelled through `cancel_debounce`.
    pub debounces_cancelled: u64,
    /// Throttle windows opened (leading edge dispatched).
    pub throttles_started: u64,
    /// Throttle calls suppressed by an open window.
    pub throttles_suppressed: u64,
    /// Throttle windows cancelled through `cancel_throttle`.
    pub throttles_cancelled: u64,
    /// Destruction sweeps executed.
    pub destruction_sweeps: u64,
    /// Plain timers cancelled by sweeps.
    pub swept_timers: u64,
    /// Debounce entries cancelled by sweeps.
    pub swept_debounces: u64,
    /// Throttle windows cancelled by sweeps.
    pub swept_throttles: u64,
    /// Deprecated unowned cancellations observed.
    pub unowned_cancels: u64,
    /// Scheduling calls rejected because the owner was destroyed.
    pub rejected_destroyed_owner: u64,
    /// Firings skipped because the owner was gone or destroyed by then.
    pub fires_skipped_dead_owner: u64,
    /// Firings skipped because a named task no longer resolved.
    pub fires_skipped_unresolved: u64,
}

/// Per-owner tracking snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerTrackSnapshot {
    /// Owner identity.
    pub owner: OwnerId,
    /// Outstanding plain/queued timer identifiers.
    pub tracked_timers: usize,
    /// Names with a pending debounce entry, sorted.
    pub pending_debounces: Vec<String>,
    /// Names with an open throttle window, sorted.
    pub open_throttles: Vec<String>,
}

/// Full binder snapshot for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinderSnapshot {
    /// Per-owner rows, sorted by owner id.
    pub owners: Vec<OwnerTrackSnapshot>,
    /// Counters at snapshot time.
    pub metrics: BinderMetrics,
}

// =============================================================================
// TaskBinder
// =============================================================================

struct BinderInner {
    config: BinderConfig,
    primitive: Arc<dyn PrimitiveScheduler>,
    host: Arc<dyn LifecycleHost>,
    store: Box<dyn OwnerStore>,
    metrics: Mutex<BinderMetrics>,
    /// Owners whose destruction hook already fired. Scheduling against one
    /// is a hard error even if the host forgot to flip `is_destroyed`.
    swept: Mutex<HashSet<OwnerId>>,
}

impl BinderInner {
    fn bump(&self, apply: impl FnOnce(&mut BinderMetrics)) {
        if let Ok(mut metrics) = self.metrics.lock() {
            apply(&mut metrics);
        }
    }

    /// The destruction-hook body: cancel everything outstanding for
    /// `owner` and drop its record. Idempotent; safe when nothing was
    /// ever scheduled.
    fn sweep_owner(&self, owner: OwnerId) {
        let already_swept = {
            let mut swept = self.swept.lock().expect("sweep set poisoned");
            !swept.insert(owner)
        };
        let record = self.store.remove(owner);
        if already_swept && record.is_none() {
            return;
        }
        let Some(record) = record else {
            // Hook fired before any work was scheduled after registration,
            // or everything already drained naturally.
            self.bump(|m| m.destruction_sweeps = m.destruction_sweeps.saturating_add(1));
            return;
        };
        let swept_work = record
            .lock()
            .expect("owner record poisoned")
            .drain_for_sweep();
        for id in swept_work
            .timers
            .iter()
            .chain(&swept_work.debounces)
            .chain(&swept_work.throttles)
        {
            self.primitive.cancel(*id);
        }
        debug!(
            owner = %owner,
            timers = swept_work.timers.len(),
            debounces = swept_work.debounces.len(),
            throttles = swept_work.throttles.len(),
            "destruction sweep cancelled outstanding work"
        );
        self.bump(|m| {
            m.destruction_sweeps = m.destruction_sweeps.saturating_add(1);
            m.swept_timers = m.swept_timers.saturating_add(swept_work.timers.len() as u64);
            m.swept_debounces = m
                .swept_debounces
                .saturating_add(swept_work.debounces.len() as u64);
            m.swept_throttles = m
                .swept_throttles
                .saturating_add(swept_work.throttles.len() as u64);
        });
    }
}

/// Lifecycle-bound dispatch façade.
///
/// Cheap to clone; clones share the registry, metrics, and injected
/// collaborators.
#[derive(Clone)]
pub struct TaskBinder {
    inner: Arc<BinderInner>,
}

impl TaskBinder {
    /// Binder over `primitive` and `host` with the default configuration
    /// and the weak (production) owner store.
    #[must_use]
    pub fn new(primitive: Arc<dyn PrimitiveScheduler>, host: Arc<dyn LifecycleHost>) -> Self {
        Self::with_store(primitive, host, BinderConfig::default(), Box::new(WeakOwnerStore::new()))
    }

    /// Binder with an explicit configuration.
    #[must_use]
    pub fn with_config(
        primitive: Arc<dyn PrimitiveScheduler>,
        host: Arc<dyn LifecycleHost>,
        config: BinderConfig,
    ) -> Self {
        Self::with_store(primitive, host, config, Box::new(WeakOwnerStore::new()))
    }

    /// Binder with an explicit owner store (tests substitute
    /// [`StrongOwnerStore`](crate::registry::StrongOwnerStore) here).
    #[must_use]
    pub fn with_store(
        primitive: Arc<dyn PrimitiveScheduler>,
        host: Arc<dyn LifecycleHost>,
        config: BinderConfig,
        store: Box<dyn OwnerStore>,
    ) -> Self {
        Self {
            inner: Arc::new(BinderInner {
                config,
                primitive,
                host,
                store,
                metrics: Mutex::new(BinderMetrics::default()),
                swept: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &BinderConfig {
        &self.inner.config
    }

    // -------------------------------------------------------------------------
    // Scheduling entry points
    // -------------------------------------------------------------------------

    /// Run `task` against `owner` after `delay_ms` milliseconds.
    ///
    /// The task never executes synchronously inside this call, executes at
    /// most once, and is cancelled by the owner's destruction sweep. The
    /// returned identifier can be passed to [`cancel_task`](Self::cancel_task).
    pub fn run_task(
        &self,
        owner: &OwnerHandle,
        task: impl Into<Task>,
        delay_ms: u64,
    ) -> Result<TimerId> {
        let task = task.into();
        self.ensure_schedulable(owner)?;
        task::resolve(owner.as_ref(), &task)?;
        let record = self.register_owner(owner);
        let (callback, slot) = self.tracked_callback(owner, &record, task);
        let id = self
            .inner
            .primitive
            .schedule_after_delay(delay_ms, callback, Vec::new());
        if slot.register(id) {
            record.lock().expect("owner record poisoned").track_timer(id);
        }
        self.inner
            .bump(|m| m.timers_scheduled = m.timers_scheduled.saturating_add(1));
        Ok(id)
    }

    /// Run `task` against `owner` when `queue` next flushes.
    ///
    /// `args` are captured now (immediate binding) and handed to the task
    /// at flush time. The reserved post-render queue and empty queue names
    /// are rejected.
    pub fn schedule_task(
        &self,
        owner: &OwnerHandle,
        queue: &str,
        task: impl Into<Task>,
        args: TaskArgs,
    ) -> Result<TimerId> {
        let task = task.into();
        if queue.is_empty() {
            return Err(Error::InvalidQueue);
        }
        if self.inner.config.reserved_queues.iter().any(|q| q == queue) {
            return Err(Error::ReservedQueue {
                queue: queue.to_string(),
            });
        }
        self.ensure_schedulable(owner)?;
        task::resolve(owner.as_ref(), &task)?;
        let record = self.register_owner(owner);
        let (callback, slot) = self.tracked_callback(owner, &record, task);
        let id = self.inner.primitive.schedule_in_queue(queue, callback, args);
        if slot.register(id) {
            record.lock().expect("owner record poisoned").track_timer(id);
        }
        self.inner
            .bump(|m| m.queue_tasks_scheduled = m.queue_tasks_scheduled.saturating_add(1));
        Ok(id)
    }

    /// Trailing-edge debounce of the named task.
    ///
    /// `args_then_wait` is the task argument list with the wait in
    /// milliseconds as its trailing element. Repeated calls for the same
    /// `(owner, name)` within the window collapse into one invocation with
    /// the latest arguments, fired `wait` after the most recent call.
    pub fn debounce_task(
        &self,
        owner: &OwnerHandle,
        name: &str,
        args_then_wait: TaskArgs,
    ) -> Result<()> {
        let (args, wait_ms, record) = self.prepare_coalesced(owner, name, args_then_wait)?;

        let (wrapped, coalesced) = {
            let guard = record.lock().expect("owner record poisoned");
            match guard.debounces.get(name) {
                Some(entry) => (Arc::clone(&entry.wrapped), true),
                None => (
                    self.debounce_callback(owner, &record, name.to_string()),
                    false,
                ),
            }
        };

        let key = CoalesceKey::new(owner.owner_id(), &wrapped);
        let id = self
            .inner
            .primitive
            .debounce(key, Arc::clone(&wrapped), args, wait_ms);

        let mut guard = record.lock().expect("owner record poisoned");
        guard.debounces.insert(
            name.to_string(),
            DebounceEntry {
                name: name.to_string(),
                wrapped,
                current_timer: id,
            },
        );
        drop(guard);

        self.inner.bump(|m| {
            m.debounces_armed = m.debounces_armed.saturating_add(1);
            if coalesced {
                m.debounces_coalesced = m.debounces_coalesced.saturating_add(1);
            }
        });
        Ok(())
    }

    /// Leading-edge throttle of the named task.
    ///
    /// The first call in a burst dispatches with its own arguments and
    /// opens a window of the trailing wait; calls while the window is open
    /// are suppressed and their arguments discarded.
    pub fn throttle_task(
        &self,
        owner: &OwnerHandle,
        name: &str,
        args_then_wait: TaskArgs,
    ) -> Result<TimerId> {
        let (args, wait_ms, record) = self.prepare_coalesced(owner, name, args_then_wait)?;

        let (wrapped, previous_window) = {
            let guard = record.lock().expect("owner record poisoned");
            match guard.throttles.get(name) {
                Some(entry) => (Arc::clone(&entry.wrapped), Some(entry.window_timer)),
                None => (
                    self.throttle_callback(owner, name.to_string()),
                    None,
                ),
            }
        };

        let key = CoalesceKey::new(owner.owner_id(), &wrapped);
        let id = self
            .inner
            .primitive
            .throttle(key, Arc::clone(&wrapped), args, wait_ms);

        let suppressed = previous_window == Some(id);
        let mut guard = record.lock().expect("owner record poisoned");
        guard.throttles.insert(
            name.to_string(),
            ThrottleEntry {
                name: name.to_string(),
                wrapped,
                window_timer: id,
            },
        );
        drop(guard);

        self.inner.bump(|m| {
            if suppressed {
                m.throttles_suppressed = m.throttles_suppressed.saturating_add(1);
            } else {
                m.throttles_started = m.throttles_started.saturating_add(1);
            }
        });
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Cancellation entry points
    // -------------------------------------------------------------------------

    /// Cancel a tracked timer for `owner`.
    ///
    /// Removes the identifier from the owner's set when present and
    /// cancels it at the primitive scheduler. Already-fired and
    /// already-cancelled identifiers are a safe no-op.
    pub fn cancel_task(&self, owner: OwnerId, id: TimerId) {
        let was_tracked = self
            .inner
            .store
            .get(owner)
            .is_some_and(|record| {
                record
                    .lock()
                    .expect("owner record poisoned")
                    .untrack_timer(id)
            });
        self.inner.primitive.cancel(id);
        if was_tracked {
            self.inner
                .bump(|m| m.timers_cancelled = m.timers_cancelled.saturating_add(1));
        }
    }

    /// Legacy single-argument cancellation.
    ///
    /// Kept for backward compatibility only: without the owner, the
    /// identifier cannot be removed from any tracked set, so the set
    /// retains a stale id until the owner's sweep. That retention is a
    /// known limitation of this form, documented rather than hidden.
    #[deprecated(
        since = "0.1.0",
        note = "use cancel_task(owner, id); the unowned form cannot scrub the owner's tracked set"
    )]
    pub fn cancel_task_unowned(&self, id: TimerId) {
        if self.inner.config.warn_on_unowned_cancel {
            warn!(
                timer = %id,
                "cancel_task_unowned is deprecated; the owner's tracked set keeps a stale id"
            );
        }
        self.inner.primitive.cancel(id);
        self.inner
            .bump(|m| m.unowned_cancels = m.unowned_cancels.saturating_add(1));
    }

    /// Cancel the pending debounce for `(owner, name)`.
    ///
    /// No-op when the owner has no record or no pending entry under that
    /// name.
    pub fn cancel_debounce(&self, owner: OwnerId, name: &str) {
        let Some(record) = self.inner.store.get(owner) else {
            return;
        };
        let entry = record
            .lock()
            .expect("owner record poisoned")
            .debounces
            .remove(name);
        if let Some(entry) = entry {
            self.inner.primitive.cancel(entry.current_timer);
            self.inner
                .bump(|m| m.debounces_cancelled = m.debounces_cancelled.saturating_add(1));
        }
    }

    /// Cancel the open throttle window for `(owner, name)`.
    ///
    /// The leading edge has already run; this only closes the suppression
    /// window early. No-op when absent.
    pub fn cancel_throttle(&self, owner: OwnerId, name: &str) {
        let Some(record) = self.inner.store.get(owner) else {
            return;
        };
        let entry = record
            .lock()
            .expect("owner record poisoned")
            .throttles
            .remove(name);
        if let Some(entry) = entry {
            self.inner.primitive.cancel(entry.window_timer);
            self.inner
                .bump(|m| m.throttles_cancelled = m.throttles_cancelled.saturating_add(1));
        }
    }

    /// Run the destruction sweep for `owner` directly.
    ///
    /// This is the same body the registered destruction hook runs; hosts
    /// that integrate without a [`LifecycleHost`] can call it from their
    /// own teardown path. Safe to invoke when nothing was ever scheduled,
    /// and idempotent.
    pub fn destruction_sweep(&self, owner: OwnerId) {
        self.inner.sweep_owner(owner);
    }

    // -------------------------------------------------------------------------
    // Observability
    // -------------------------------------------------------------------------

    /// Counters since construction.
    #[must_use]
    pub fn metrics(&self) -> BinderMetrics {
        *self.inner.metrics.lock().expect("metrics poisoned")
    }

    /// Enumerable tracking snapshot.
    ///
    /// Row contents are only as complete as the injected store's
    /// enumeration; the weak production store reaps dropped owners as a
    /// side effect.
    #[must_use]
    pub fn snapshot(&self) -> BinderSnapshot {
        let mut owners: Vec<OwnerTrackSnapshot> = self
            .inner
            .store
            .tracked_owners()
            .into_iter()
            .filter_map(|owner| self.owner_snapshot(owner))
            .collect();
        owners.sort_by_key(|row| row.owner);
        BinderSnapshot {
            owners,
            metrics: self.metrics(),
        }
    }

    /// Tracking snapshot for a single owner, if it holds a record.
    #[must_use]
    pub fn owner_snapshot(&self, owner: OwnerId) -> Option<OwnerTrackSnapshot> {
        let record = self.inner.store.get(owner)?;
        let guard = record.lock().expect("owner record poisoned");
        let mut pending_debounces: Vec<String> = guard.debounces.keys().cloned().collect();
        pending_debounces.sort();
        let mut open_throttles: Vec<String> = guard.throttles.keys().cloned().collect();
        open_throttles.sort();
        Some(OwnerTrackSnapshot {
            owner,
            tracked_timers: guard.timer_count(),
            pending_debounces,
            open_throttles,
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ensure_schedulable(&self, owner: &OwnerHandle) -> Result<()> {
        let owner_id = owner.owner_id();
        let swept = self
            .inner
            .swept
            .lock()
            .expect("sweep set poisoned")
            .contains(&owner_id);
        if swept || owner.is_destroyed() {
            self.inner.bump(|m| {
                m.rejected_destroyed_owner = m.rejected_destroyed_owner.saturating_add(1);
            });
            return Err(Error::DestroyedOwner { owner: owner_id });
        }
        Ok(())
    }

    /// Fetch the record, registering the destruction hook on first contact.
    fn register_owner(&self, owner: &OwnerHandle) -> RecordHandle {
        let record = self.inner.store.get_or_create(owner);
        let needs_hook = {
            let mut guard = record.lock().expect("owner record poisoned");
            if guard.hook_registered {
                false
            } else {
                guard.hook_registered = true;
                true
            }
        };
        if needs_hook {
            let owner_id = owner.owner_id();
            let inner = Arc::downgrade(&self.inner);
            self.inner.host.register_destruction_hook(
                owner_id,
                Box::new(move || {
                    if let Some(inner) = inner.upgrade() {
                        inner.sweep_owner(owner_id);
                    }
                }),
            );
        }
        record
    }

    /// Wrap a plain/queued task: self-remove from the timer set, then
    /// resolve and invoke against the owner.
    fn tracked_callback(
        &self,
        owner: &OwnerHandle,
        record: &RecordHandle,
        task: Task,
    ) -> (TaskFn, Arc<TimerSlot>) {
        let slot = TimerSlot::new();
        let slot_for_fire = Arc::clone(&slot);
        let record_for_fire = Arc::clone(record);
        let weak_owner = Arc::downgrade(owner);
        let inner = Arc::downgrade(&self.inner);
        let callback: TaskFn = Arc::new(move |args: &[Value]| {
            if let Some(id) = slot_for_fire.take_fired() {
                if let Ok(mut guard) = record_for_fire.lock() {
                    guard.untrack_timer(id);
                }
            }
            if dispatch_fire(&inner, &weak_owner, &task, args) {
                if let Some(inner) = inner.upgrade() {
                    inner.bump(|m| m.timers_fired = m.timers_fired.saturating_add(1));
                }
            }
        });
        (callback, slot)
    }

    /// Wrap a debounced task: drop the entry from the map before
    /// invocation, then resolve late and invoke with the latest arguments.
    fn debounce_callback(
        &self,
        owner: &OwnerHandle,
        record: &RecordHandle,
        name: String,
    ) -> TaskFn {
        let record_for_fire = Arc::clone(record);
        let weak_owner = Arc::downgrade(owner);
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |args: &[Value]| {
            if let Ok(mut guard) = record_for_fire.lock() {
                guard.debounces.remove(&name);
            }
            let task = Task::Named(name.clone());
            if dispatch_fire(&inner, &weak_owner, &task, args) {
                if let Some(inner) = inner.upgrade() {
                    inner.bump(|m| m.debounces_fired = m.debounces_fired.saturating_add(1));
                }
            }
        })
    }

    /// Wrap a throttled task: the window entry outlives the leading-edge
    /// dispatch, so the wrapper only resolves late and invokes.
    fn throttle_callback(&self, owner: &OwnerHandle, name: String) -> TaskFn {
        let weak_owner = Arc::downgrade(owner);
        let inner = Arc::downgrade(&self.inner);
        Arc::new(move |args: &[Value]| {
            let task = Task::Named(name.clone());
            let _ = dispatch_fire(&inner, &weak_owner, &task, args);
        })
    }

    /// Shared validation for the debounce/throttle entry points.
    fn prepare_coalesced(
        &self,
        owner: &OwnerHandle,
        name: &str,
        args_then_wait: TaskArgs,
    ) -> Result<(TaskArgs, u64, RecordHandle)> {
        self.ensure_schedulable(owner)?;
        task::resolve(owner.as_ref(), &Task::Named(name.to_string()))?;
        let (args, wait_ms) = task::split_trailing_wait(args_then_wait)?;
        let record = self.register_owner(owner);
        Ok((args, wait_ms, record))
    }
}

/// Resolve and invoke at fire time. Returns whether the task body ran.
///
/// The owner is re-examined here: a dead weak handle or a destroyed owner
/// means the work must not run (the sweep normally cancels first; this is
/// the last line of the never-after-destroy guarantee). A name that no
/// longer resolves is a host bug surfaced at `warn` — there is no caller
/// to raise to at fire time.
fn dispatch_fire(
    inner: &Weak<BinderInner>,
    owner: &Weak<dyn Owner>,
    task: &Task,
    args: &[Value],
) -> bool {
    let Some(owner) = owner.upgrade() else {
        if let Some(inner) = inner.upgrade() {
            inner.bump(|m| {
                m.fires_skipped_dead_owner = m.fires_skipped_dead_owner.saturating_add(1);
            });
        }
        debug!(task = task.label(), "skipping fire: owner dropped");
        return false;
    };
    if owner.is_destroyed() {
        if let Some(inner) = inner.upgrade() {
            inner.bump(|m| {
                m.fires_skipped_dead_owner = m.fires_skipped_dead_owner.saturating_add(1);
            });
        }
        debug!(owner = %owner.owner_id(), task = task.label(), "skipping fire: owner destroyed");
        return false;
    }
    match task::resolve(owner.as_ref(), task) {
        Ok(callable) => {
            callable(args);
            true
        }
        Err(err) => {
            warn!(
                owner = %owner.owner_id(),
                task = task.label(),
                error = %err,
                "skipping fire: task no longer resolves"
            );
            if let Some(inner) = inner.upgrade() {
                inner.bump(|m| {
                    m.fires_skipped_unresolved = m.fires_skipped_unresolved.saturating_add(1);
                });
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_reserves_post_render_queue() {
        let config = BinderConfig::default();
        assert_eq!(config.reserved_queues, vec![DEFAULT_RESERVED_QUEUE]);
        assert!(config.warn_on_unowned_cancel);
    }

    #[test]
    fn config_serde_roundtrip() {
        let config = BinderConfig {
            reserved_queues: vec!["render".to_string(), "after_render".to_string()],
            warn_on_unowned_cancel: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: BinderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn config_serde_fills_defaults() {
        let config: BinderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BinderConfig::default());
    }

    #[test]
    fn metrics_serde_roundtrip() {
        let metrics = BinderMetrics {
            timers_scheduled: 3,
            destruction_sweeps: 1,
            ..BinderMetrics::default()
        };
        let json = serde_json::to_string(&metrics).unwrap();
        let back: BinderMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metrics);
    }
}

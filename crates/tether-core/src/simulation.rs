//! Deterministic simulation doubles for the primitive scheduler and the
//! host lifecycle.
//!
//! [`ManualScheduler`] is a virtual-clock implementation of
//! [`PrimitiveScheduler`]: nothing fires until the test advances the clock
//! or flushes a queue, so every interleaving in a test is explicit and
//! repeatable. [`ManualHost`] stores destruction hooks for the test to
//! fire, and [`SimOwner`] is a scriptable owner with a named-task table
//! and a recorded-invocation log.
//!
//! These doubles are also the reference semantics for the primitive
//! contract: trailing-edge debounce keyed by [`CoalesceKey`], a
//! leading-edge throttle window, FIFO queue flushes, and idempotent
//! cancellation.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::trace;

use crate::owner::{CleanupFn, LifecycleHost, Owner, OwnerId};
use crate::scheduler::{CoalesceKey, PrimitiveScheduler, TimerId};
use crate::task::{TaskArgs, TaskFn};

// =============================================================================
// ManualScheduler
// =============================================================================

struct DelayedEntry {
    id: TimerId,
    due_ms: u64,
    callback: TaskFn,
    args: TaskArgs,
}

struct QueuedEntry {
    id: TimerId,
    callback: TaskFn,
    args: TaskArgs,
}

struct DebounceState {
    timer: TimerId,
    due_ms: u64,
    callback: TaskFn,
    args: TaskArgs,
}

struct WindowState {
    timer: TimerId,
    until_ms: u64,
}

#[derive(Default)]
struct ManualState {
    now_ms: u64,
    next_timer: u64,
    delayed: Vec<DelayedEntry>,
    queues: HashMap<String, VecDeque<QueuedEntry>>,
    debounces: HashMap<CoalesceKey, DebounceState>,
    windows: HashMap<CoalesceKey, WindowState>,
}

impl ManualState {
    fn allocate(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId::from_raw(self.next_timer)
    }

    fn expire_windows(&mut self) {
        let now = self.now_ms;
        self.windows.retain(|_, window| window.until_ms > now);
    }

    /// Earliest due entry at or before `target`, favoring earlier due
    /// times and then smaller (older) identifiers.
    fn pop_due(&mut self, target_ms: u64) -> Option<(TimerId, u64, TaskFn, TaskArgs)> {
        let delayed_best = self
            .delayed
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due_ms <= target_ms)
            .min_by_key(|(_, entry)| (entry.due_ms, entry.id))
            .map(|(index, entry)| (entry.due_ms, entry.id, index));
        let debounce_best = self
            .debounces
            .iter()
            .filter(|(_, state)| state.due_ms <= target_ms)
            .min_by_key(|(_, state)| (state.due_ms, state.timer))
            .map(|(key, state)| (state.due_ms, state.timer, *key));

        match (delayed_best, debounce_best) {
            (Some((due, id, index)), Some((debounce_due, debounce_id, _)))
                if (due, id) <= (debounce_due, debounce_id) =>
            {
                let entry = self.delayed.swap_remove(index);
                Some((entry.id, entry.due_ms, entry.callback, entry.args))
            }
            (Some((_, _, index)), None) => {
                let entry = self.delayed.swap_remove(index);
                Some((entry.id, entry.due_ms, entry.callback, entry.args))
            }
            (_, Some((_, _, key))) => {
                let state = self.debounces.remove(&key)?;
                Some((state.timer, state.due_ms, state.callback, state.args))
            }
            (None, None) => None,
        }
    }
}

/// Virtual-clock primitive scheduler for tests and simulations.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Scheduler with the clock at zero and nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.state.lock().expect("manual scheduler poisoned").now_ms
    }

    /// Advance the clock by `delta_ms`, firing every delayed task and
    /// debounce whose due time falls inside the window, in due order.
    /// Tasks scheduled by a firing callback participate when they land
    /// inside the same window.
    pub fn advance(&self, delta_ms: u64) {
        let target_ms = {
            let state = self.state.lock().expect("manual scheduler poisoned");
            state.now_ms.saturating_add(delta_ms)
        };
        loop {
            let due = {
                let mut state = self.state.lock().expect("manual scheduler poisoned");
                let due = state.pop_due(target_ms);
                match &due {
                    Some((id, due_ms, _, _)) => {
                        state.now_ms = state.now_ms.max(*due_ms);
                        trace!(timer = %id, now = state.now_ms, "manual scheduler firing");
                    }
                    None => state.now_ms = target_ms,
                }
                state.expire_windows();
                due
            };
            let Some((_, _, callback, args)) = due else {
                break;
            };
            callback(&args);
        }
    }

    /// Fire everything already due without moving the clock.
    pub fn tick(&self) {
        self.advance(0);
    }

    /// Flush one named queue in FIFO order, draining tasks enqueued by
    /// the flushed tasks as well.
    pub fn flush_queue(&self, queue: &str) {
        loop {
            let batch: Vec<QueuedEntry> = {
                let mut state = self.state.lock().expect("manual scheduler poisoned");
                state
                    .queues
                    .get_mut(queue)
                    .map(|entries| entries.drain(..).collect())
                    .unwrap_or_default()
            };
            if batch.is_empty() {
                break;
            }
            for entry in batch {
                (entry.callback)(&entry.args);
            }
        }
    }

    /// Flush every queue, in queue-name order for determinism.
    pub fn flush_all_queues(&self) {
        loop {
            let mut names: Vec<String> = {
                let state = self.state.lock().expect("manual scheduler poisoned");
                state
                    .queues
                    .iter()
                    .filter(|(_, entries)| !entries.is_empty())
                    .map(|(name, _)| name.clone())
                    .collect()
            };
            if names.is_empty() {
                break;
            }
            names.sort();
            for name in names {
                self.flush_queue(&name);
            }
        }
    }

    /// Run `body` as a batch: queued work lands while it runs and flushes
    /// when it ends, the way a run-loop batch behaves.
    pub fn run_batch(&self, body: impl FnOnce()) {
        body();
        self.flush_all_queues();
    }

    /// Whether an identifier is still pending anywhere (delayed, queued,
    /// debounce, or an open throttle window).
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        let state = self.state.lock().expect("manual scheduler poisoned");
        state.delayed.iter().any(|entry| entry.id == id)
            || state
                .queues
                .values()
                .any(|entries| entries.iter().any(|entry| entry.id == id))
            || state.debounces.values().any(|entry| entry.timer == id)
            || state.windows.values().any(|window| window.timer == id)
    }

    /// Total count of pending delayed + debounce entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock().expect("manual scheduler poisoned");
        state.delayed.len() + state.debounces.len()
    }

    /// Number of tasks waiting in `queue`.
    #[must_use]
    pub fn queued_count(&self, queue: &str) -> usize {
        let state = self.state.lock().expect("manual scheduler poisoned");
        state.queues.get(queue).map_or(0, VecDeque::len)
    }
}

impl PrimitiveScheduler for ManualScheduler {
    fn schedule_after_delay(&self, delay_ms: u64, callback: TaskFn, args: TaskArgs) -> TimerId {
        let mut state = self.state.lock().expect("manual scheduler poisoned");
        let id = state.allocate();
        let due_ms = state.now_ms.saturating_add(delay_ms);
        state.delayed.push(DelayedEntry {
            id,
            due_ms,
            callback,
            args,
        });
        id
    }

    fn schedule_in_queue(&self, queue: &str, callback: TaskFn, args: TaskArgs) -> TimerId {
        let mut state = self.state.lock().expect("manual scheduler poisoned");
        let id = state.allocate();
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(QueuedEntry { id, callback, args });
        id
    }

    fn debounce(
        &self,
        key: CoalesceKey,
        callback: TaskFn,
        args: TaskArgs,
        wait_ms: u64,
    ) -> TimerId {
        let mut state = self.state.lock().expect("manual scheduler poisoned");
        let id = state.allocate();
        let due_ms = state.now_ms.saturating_add(wait_ms);
        // Rearm: the latest call's args and deadline replace the pending
        // ones wholesale.
        state.debounces.insert(
            key,
            DebounceState {
                timer: id,
                due_ms,
                callback,
                args,
            },
        );
        id
    }

    fn throttle(
        &self,
        key: CoalesceKey,
        callback: TaskFn,
        args: TaskArgs,
        wait_ms: u64,
    ) -> TimerId {
        let leading = {
            let mut state = self.state.lock().expect("manual scheduler poisoned");
            state.expire_windows();
            if let Some(window) = state.windows.get(&key) {
                // Window open: suppress, discard args.
                return window.timer;
            }
            let id = state.allocate();
            let until_ms = state.now_ms.saturating_add(wait_ms);
            state.windows.insert(key, WindowState { timer: id, until_ms });
            (id, callback, args)
        };
        let (id, callback, args) = leading;
        callback(&args);
        id
    }

    fn cancel(&self, timer: TimerId) {
        let mut state = self.state.lock().expect("manual scheduler poisoned");
        state.delayed.retain(|entry| entry.id != timer);
        for entries in state.queues.values_mut() {
            entries.retain(|entry| entry.id != timer);
        }
        state.debounces.retain(|_, entry| entry.timer != timer);
        state.windows.retain(|_, window| window.timer != timer);
    }
}

// =============================================================================
// ManualHost
// =============================================================================

/// Lifecycle host double: stores destruction hooks until the test fires
/// them.
#[derive(Default)]
pub struct ManualHost {
    hooks: Mutex<HashMap<OwnerId, Vec<CleanupFn>>>,
}

impl ManualHost {
    /// Host with no registered hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hooks registered for `owner`. The binder registers at
    /// most one.
    #[must_use]
    pub fn hook_count(&self, owner: OwnerId) -> usize {
        self.hooks
            .lock()
            .expect("manual host poisoned")
            .get(&owner)
            .map_or(0, Vec::len)
    }

    /// Fire and consume every hook registered for `owner`.
    pub fn fire_destruction(&self, owner: OwnerId) {
        let hooks = self
            .hooks
            .lock()
            .expect("manual host poisoned")
            .remove(&owner)
            .unwrap_or_default();
        for hook in hooks {
            hook();
        }
    }
}

impl LifecycleHost for ManualHost {
    fn register_destruction_hook(&self, owner: OwnerId, cleanup: CleanupFn) {
        self.hooks
            .lock()
            .expect("manual host poisoned")
            .entry(owner)
            .or_default()
            .push(cleanup);
    }
}

// =============================================================================
// SimOwner
// =============================================================================

/// Scriptable owner for tests: a named-task table, a destroyed flag, and
/// a recorded-invocation log.
pub struct SimOwner {
    id: OwnerId,
    destroyed: AtomicBool,
    tasks: Mutex<HashMap<String, TaskFn>>,
    calls: Mutex<Vec<(String, TaskArgs)>>,
}

impl SimOwner {
    /// Fresh owner with a unique identity and no tasks.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: OwnerId::next(),
            destroyed: AtomicBool::new(false),
            tasks: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Install (or replace) a named task.
    pub fn set_task<F>(&self, name: &str, task: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.tasks
            .lock()
            .expect("sim owner poisoned")
            .insert(name.to_string(), Arc::new(task));
    }

    /// Install a named task that appends `(name, args)` to the owner's
    /// call log when invoked.
    pub fn record_task(self: &Arc<Self>, name: &str) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let recorded_name = name.to_string();
        self.set_task(name, move |args| {
            if let Some(owner) = weak.upgrade() {
                owner
                    .calls
                    .lock()
                    .expect("sim owner poisoned")
                    .push((recorded_name.clone(), args.to_vec()));
            }
        });
    }

    /// Remove a named task; later firings of that name skip with a
    /// warning.
    pub fn remove_task(&self, name: &str) {
        self.tasks.lock().expect("sim owner poisoned").remove(name);
    }

    /// Flip the destroyed observable. The registry rejects scheduling
    /// from this point on.
    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    /// Mark destroyed and fire the destruction hooks registered with
    /// `host`, in that order — the host contract.
    pub fn destroy(self: &Arc<Self>, host: &ManualHost) {
        self.mark_destroyed();
        host.fire_destruction(self.id);
    }

    /// Recorded invocations, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, TaskArgs)> {
        self.calls.lock().expect("sim owner poisoned").clone()
    }

    /// Number of recorded invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("sim owner poisoned").len()
    }
}

impl Owner for SimOwner {
    fn owner_id(&self) -> OwnerId {
        self.id
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn lookup_task(&self, name: &str) -> Option<TaskFn> {
        self.tasks
            .lock()
            .expect("sim owner poisoned")
            .get(name)
            .map(Arc::clone)
    }
}

//! Tokio-backed primitive scheduler adapter.
//!
//! [`TokioScheduler`] binds the [`PrimitiveScheduler`] contract to tokio
//! timers and tasks: delayed tasks are sleeps, named queues are serialized
//! FIFO worker tasks, debounce rearms abort-and-respawn a sleep, and
//! throttle windows are expiry sleeps. Construct and use it inside a
//! running tokio runtime.
//!
//! Cancellation is arbitrated by the adapter's own maps: the fire path
//! only invokes after winning the map entry, so once `cancel` returns the
//! callback will not start. On a current-thread runtime this is exact; on
//! a multi-thread runtime a callback already dispatched on another worker
//! in the same instant may still complete.
//!
//! Batch semantics (`run_batch`, explicit flushes) exist only on the
//! [`ManualScheduler`](crate::simulation::ManualScheduler); here a queue
//! drains continuously, preserving FIFO order per queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::trace;

use crate::scheduler::{CoalesceKey, PrimitiveScheduler, TimerId};
use crate::task::{TaskArgs, TaskFn};

struct DelayedEntry {
    abort: Option<AbortHandle>,
}

struct QueueMessage {
    id: TimerId,
    cancelled: Arc<AtomicBool>,
    callback: TaskFn,
    args: TaskArgs,
}

struct DebounceEntry {
    timer: TimerId,
    abort: Option<AbortHandle>,
}

struct WindowEntry {
    timer: TimerId,
}

#[derive(Default)]
struct TokioInner {
    next_timer: AtomicU64,
    delayed: Mutex<HashMap<TimerId, DelayedEntry>>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<QueueMessage>>>,
    queued: Mutex<HashMap<TimerId, Arc<AtomicBool>>>,
    debounces: Mutex<HashMap<CoalesceKey, DebounceEntry>>,
    windows: Mutex<HashMap<CoalesceKey, WindowEntry>>,
}

impl TokioInner {
    fn allocate(&self) -> TimerId {
        TimerId::from_raw(self.next_timer.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Primitive scheduler over tokio timers and tasks.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    inner: Arc<TokioInner>,
}

impl TokioScheduler {
    /// Adapter with nothing pending. Must be used inside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding delayed-task count, for diagnostics.
    #[must_use]
    pub fn pending_delayed(&self) -> usize {
        self.inner.delayed.lock().expect("tokio adapter poisoned").len()
    }

    /// Outstanding queued-task count across all queues.
    #[must_use]
    pub fn pending_queued(&self) -> usize {
        self.inner.queued.lock().expect("tokio adapter poisoned").len()
    }

    fn queue_sender(&self, queue: &str) -> mpsc::UnboundedSender<QueueMessage> {
        let mut queues = self.inner.queues.lock().expect("tokio adapter poisoned");
        queues
            .entry(queue.to_string())
            .or_insert_with(|| {
                let (tx, mut rx) = mpsc::unbounded_channel::<QueueMessage>();
                let inner = Arc::downgrade(&self.inner);
                tokio::spawn(async move {
                    while let Some(message) = rx.recv().await {
                        let live = !message.cancelled.load(Ordering::SeqCst);
                        if live {
                            (message.callback)(&message.args);
                        }
                        if let Some(inner) = inner.upgrade() {
                            inner
                                .queued
                                .lock()
                                .expect("tokio adapter poisoned")
                                .remove(&message.id);
                        }
                    }
                });
                tx
            })
            .clone()
    }
}

impl PrimitiveScheduler for TokioScheduler {
    fn schedule_after_delay(&self, delay_ms: u64, callback: TaskFn, args: TaskArgs) -> TimerId {
        let id = self.inner.allocate();
        self.inner
            .delayed
            .lock()
            .expect("tokio adapter poisoned")
            .insert(id, DelayedEntry { abort: None });

        let inner = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            // Winning the entry authorizes the invocation; a cancel that
            // got there first already removed it.
            let authorized = inner
                .delayed
                .lock()
                .expect("tokio adapter poisoned")
                .remove(&id)
                .is_some();
            if authorized {
                trace!(timer = %id, "tokio adapter firing delayed task");
                callback(&args);
            }
        });

        let mut delayed = self.inner.delayed.lock().expect("tokio adapter poisoned");
        match delayed.get_mut(&id) {
            Some(entry) => entry.abort = Some(handle.abort_handle()),
            // Cancelled (or fired) between spawn and bookkeeping.
            None => handle.abort(),
        }
        id
    }

    fn schedule_in_queue(&self, queue: &str, callback: TaskFn, args: TaskArgs) -> TimerId {
        let id = self.inner.allocate();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.inner
            .queued
            .lock()
            .expect("tokio adapter poisoned")
            .insert(id, Arc::clone(&cancelled));
        let sender = self.queue_sender(queue);
        // The worker owning the receiver only exits once the adapter is
        // dropped, so a send can only fail during teardown.
        let _ = sender.send(QueueMessage {
            id,
            cancelled,
            callback,
            args,
        });
        id
    }

    fn debounce(
        &self,
        key: CoalesceKey,
        callback: TaskFn,
        args: TaskArgs,
        wait_ms: u64,
    ) -> TimerId {
        let id = self.inner.allocate();
        {
            let mut debounces = self.inner.debounces.lock().expect("tokio adapter poisoned");
            if let Some(previous) = debounces.insert(key, DebounceEntry { timer: id, abort: None })
            {
                if let Some(abort) = previous.abort {
                    abort.abort();
                }
            }
        }

        let inner = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let authorized = {
                let mut debounces = inner.debounces.lock().expect("tokio adapter poisoned");
                match debounces.get(&key) {
                    Some(entry) if entry.timer == id => {
                        debounces.remove(&key);
                        true
                    }
                    // Rearmed or cancelled while sleeping.
                    _ => false,
                }
            };
            if authorized {
                trace!(timer = %id, "tokio adapter firing debounce");
                callback(&args);
            }
        });

        let mut debounces = self.inner.debounces.lock().expect("tokio adapter poisoned");
        match debounces.get_mut(&key) {
            Some(entry) if entry.timer == id => entry.abort = Some(handle.abort_handle()),
            _ => handle.abort(),
        }
        id
    }

    fn throttle(
        &self,
        key: CoalesceKey,
        callback: TaskFn,
        args: TaskArgs,
        wait_ms: u64,
    ) -> TimerId {
        let id = {
            let mut windows = self.inner.windows.lock().expect("tokio adapter poisoned");
            if let Some(window) = windows.get(&key) {
                // Window open: suppress, discard args.
                return window.timer;
            }
            let id = self.inner.allocate();
            windows.insert(key, WindowEntry { timer: id });
            id
        };

        // Leading edge on its own task, then window expiry.
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            callback(&args);
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            if let Some(inner) = inner.upgrade() {
                let mut windows = inner.windows.lock().expect("tokio adapter poisoned");
                if windows.get(&key).is_some_and(|window| window.timer == id) {
                    windows.remove(&key);
                }
            }
        });
        id
    }

    fn cancel(&self, timer: TimerId) {
        if let Some(entry) = self
            .inner
            .delayed
            .lock()
            .expect("tokio adapter poisoned")
            .remove(&timer)
        {
            if let Some(abort) = entry.abort {
                abort.abort();
            }
            return;
        }
        if let Some(cancelled) = self
            .inner
            .queued
            .lock()
            .expect("tokio adapter poisoned")
            .remove(&timer)
        {
            cancelled.store(true, Ordering::SeqCst);
            return;
        }
        {
            let mut debounces = self.inner.debounces.lock().expect("tokio adapter poisoned");
            let mut aborted = None;
            debounces.retain(|_, entry| {
                if entry.timer == timer {
                    aborted = entry.abort.take();
                    false
                } else {
                    true
                }
            });
            if let Some(abort) = aborted {
                abort.abort();
                return;
            }
        }
        let mut windows = self.inner.windows.lock().expect("tokio adapter poisoned");
        windows.retain(|_, window| window.timer != timer);
    }
}

//! Primitive scheduler contract.
//!
//! The core sits above a generic "run later / run in queue / throttle /
//! debounce / cancel" primitive. Implementations own timer identity and
//! window bookkeeping; the core only records the identifiers they hand
//! back and cancels through them. Two implementations ship with the crate:
//! the deterministic [`ManualScheduler`](crate::simulation::ManualScheduler)
//! used by tests, and the tokio-backed
//! [`TokioScheduler`](crate::runtime::TokioScheduler).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::owner::OwnerId;
use crate::task::{TaskArgs, TaskFn};

/// Opaque handle for one outstanding scheduled invocation.
///
/// Issued by the primitive scheduler. Equality-comparable; the only
/// operation the core performs on one is cancellation, and cancelling an
/// identifier that already fired (or was already cancelled) must be a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(u64);

impl TimerId {
    /// Build an identifier from its raw value. Primitive schedulers are
    /// the only intended issuers.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value, for log correlation.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key under which a primitive scheduler coalesces debounce/throttle state.
///
/// Combines the owner identity with the callable's pointer identity. The
/// tracker reuses one wrapped callable per `(owner, name)` burst precisely
/// so this key stays stable across the burst — a fresh wrapper per call
/// would defeat coalescing at the primitive level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoalesceKey {
    /// Owner the coalesced work belongs to.
    pub owner: OwnerId,
    /// Pointer identity of the wrapped callable.
    pub callable: usize,
}

impl CoalesceKey {
    /// Derive the key for `callable` scheduled against `owner`.
    #[must_use]
    pub fn new(owner: OwnerId, callable: &TaskFn) -> Self {
        Self {
            owner,
            callable: Arc::as_ptr(callable).cast::<()>() as usize,
        }
    }
}

/// The primitive scheduling surface consumed by the core.
///
/// From the core's point of view every method returns immediately with an
/// identifier and the callback body runs at a later, unspecified tick —
/// with one exception: `throttle` dispatches its leading edge as part of
/// the call when no window is open for the key (the manual implementation
/// invokes synchronously, the tokio one on a zero-delay task).
pub trait PrimitiveScheduler: Send + Sync {
    /// Run `callback(args)` once, `delay_ms` milliseconds from now.
    fn schedule_after_delay(&self, delay_ms: u64, callback: TaskFn, args: TaskArgs) -> TimerId;

    /// Run `callback(args)` once when queue `queue` next flushes.
    /// FIFO within a queue; no ordering across queues or delays.
    fn schedule_in_queue(&self, queue: &str, callback: TaskFn, args: TaskArgs) -> TimerId;

    /// Trailing-edge debounce: (re)arm the window for `key`, replacing the
    /// captured `args`, and return a fresh identifier for the rearmed
    /// timer. `callback(latest_args)` runs once, `wait_ms` after the most
    /// recent call.
    fn debounce(&self, key: CoalesceKey, callback: TaskFn, args: TaskArgs, wait_ms: u64)
    -> TimerId;

    /// Leading-edge throttle: when no window is open for `key`, dispatch
    /// `callback(args)` and open a `wait_ms` window, returning the window
    /// identifier. Calls while the window is open are suppressed entirely
    /// (their arguments discarded) and return the open window's
    /// identifier.
    fn throttle(&self, key: CoalesceKey, callback: TaskFn, args: TaskArgs, wait_ms: u64)
    -> TimerId;

    /// Cancel an outstanding identifier. Unknown, fired, and
    /// already-cancelled identifiers are ignored.
    fn cancel(&self, timer: TimerId);
}

//! Per-owner bookkeeping: records, trackers, and the owner store.
//!
//! Each owner with outstanding work has one [`OwnerRecord`] holding its
//! tracked timer identifiers plus its pending debounce and throttle
//! entries. Records are created lazily on the first scheduling call and
//! torn down exactly once when the owner's destruction hook fires.
//!
//! The store that maps owners to records is injectable ([`OwnerStore`]):
//! production uses [`WeakOwnerStore`], which never extends an owner's
//! lifetime, while tests can substitute [`StrongOwnerStore`] to keep
//! owners alive and enumerate records for emptiness assertions.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::owner::{OwnerHandle, OwnerId};
use crate::scheduler::TimerId;
use crate::task::TaskFn;

// =============================================================================
// Debounce / throttle entries
// =============================================================================

/// The single pending debounce for one `(owner, name)` pair.
///
/// `wrapped` is created on the first call of a burst and reused for every
/// rearm so the primitive scheduler sees one stable coalesce key;
/// `current_timer` is replaced on every call and is the identifier used
/// for cancellation.
#[derive(Clone)]
pub struct DebounceEntry {
    /// Task name the entry debounces.
    pub name: String,
    /// Wrapped callable shared across the burst.
    pub wrapped: TaskFn,
    /// Freshest timer identifier for the pending invocation.
    pub current_timer: TimerId,
}

impl fmt::Debug for DebounceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebounceEntry")
            .field("name", &self.name)
            .field("current_timer", &self.current_timer)
            .finish_non_exhaustive()
    }
}

/// The open throttle window for one `(owner, name)` pair.
///
/// Mirrors [`DebounceEntry`]; the leading edge has already run by the time
/// the entry exists, so the tracked identifier is only the inert window
/// marker that suppression rides on.
#[derive(Clone)]
pub struct ThrottleEntry {
    /// Task name the entry throttles.
    pub name: String,
    /// Wrapped callable shared across the window.
    pub wrapped: TaskFn,
    /// Identifier of the open window at the primitive scheduler.
    pub window_timer: TimerId,
}

impl fmt::Debug for ThrottleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleEntry")
            .field("name", &self.name)
            .field("window_timer", &self.window_timer)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Owner record
// =============================================================================

/// Everything outstanding for one owner.
#[derive(Debug, Default)]
pub struct OwnerRecord {
    /// Identifiers of plain delayed/queued tasks still pending.
    pub timers: HashSet<TimerId>,
    /// Pending debounce entry per task name (at most one per name).
    pub debounces: HashMap<String, DebounceEntry>,
    /// Open throttle window per task name (at most one per name).
    pub throttles: HashMap<String, ThrottleEntry>,
    /// Whether the destruction hook has been registered with the host.
    /// Set once; repeated `get_or_create` calls never re-register.
    pub hook_registered: bool,
}

impl OwnerRecord {
    /// Track a plain timer identifier.
    pub fn track_timer(&mut self, id: TimerId) {
        self.timers.insert(id);
    }

    /// Stop tracking a timer identifier. Returns whether it was tracked.
    pub fn untrack_timer(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id)
    }

    /// Number of outstanding plain timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// True when nothing is outstanding for this owner.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.timers.is_empty() && self.debounces.is_empty() && self.throttles.is_empty()
    }

    /// Drain every tracked identifier for the destruction sweep.
    ///
    /// Clears all three collections and returns the identifiers to cancel
    /// at the primitive scheduler, in no particular order.
    pub fn drain_for_sweep(&mut self) -> SweptWork {
        let timers: Vec<TimerId> = self.timers.drain().collect();
        let debounces: Vec<TimerId> = self
            .debounces
            .drain()
            .map(|(_, entry)| entry.current_timer)
            .collect();
        let throttles: Vec<TimerId> = self
            .throttles
            .drain()
            .map(|(_, entry)| entry.window_timer)
            .collect();
        SweptWork {
            timers,
            debounces,
            throttles,
        }
    }
}

/// Identifiers drained from a record by the destruction sweep.
#[derive(Debug, Default)]
pub struct SweptWork {
    /// Plain timer identifiers.
    pub timers: Vec<TimerId>,
    /// Pending debounce timer identifiers.
    pub debounces: Vec<TimerId>,
    /// Open throttle window identifiers.
    pub throttles: Vec<TimerId>,
}

impl SweptWork {
    /// Total number of cancelled identifiers.
    #[must_use]
    pub fn total(&self) -> usize {
        self.timers.len() + self.debounces.len() + self.throttles.len()
    }
}

// =============================================================================
// Timer slot
// =============================================================================

#[derive(Debug, Default)]
enum SlotState {
    /// Registration in flight; primitive id not yet known.
    #[default]
    Pending,
    /// Registration recorded this id in the owner's timer set.
    Registered(TimerId),
    /// The closure fired before registration completed; never track.
    Fired,
}

/// Handshake between a scheduled closure and its registration.
///
/// The closure must remove its own identifier from the owner's timer set
/// when it fires, but the identifier only exists once the primitive call
/// returns. The slot closes that loop: registration stamps the id after
/// the fact, and a fire that beats registration flips the slot so the id
/// is never inserted at all.
#[derive(Debug, Default)]
pub struct TimerSlot {
    state: Mutex<SlotState>,
}

impl TimerSlot {
    /// Fresh slot in the pending state.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stamp the primitive-issued id. Returns `true` when the id should be
    /// tracked — `false` means the closure already fired.
    pub fn register(&self, id: TimerId) -> bool {
        let mut state = self.state.lock().expect("timer slot poisoned");
        match *state {
            SlotState::Pending => {
                *state = SlotState::Registered(id);
                true
            }
            SlotState::Fired => false,
            SlotState::Registered(_) => {
                debug!(timer = %id, "timer slot registered twice; keeping first id");
                false
            }
        }
    }

    /// Consume the slot from the fire path. Returns the id to untrack when
    /// registration happened first.
    pub fn take_fired(&self) -> Option<TimerId> {
        let mut state = self.state.lock().expect("timer slot poisoned");
        match std::mem::replace(&mut *state, SlotState::Fired) {
            SlotState::Registered(id) => Some(id),
            SlotState::Pending | SlotState::Fired => None,
        }
    }
}

// =============================================================================
// Owner store
// =============================================================================

/// Shared, lock-guarded record handle.
pub type RecordHandle = Arc<Mutex<OwnerRecord>>;

/// The owner-to-record association, injectable so tests can swap the weak
/// production mapping for a strong, enumerable one.
pub trait OwnerStore: Send + Sync {
    /// Fetch the record for `owner`, creating it lazily.
    fn get_or_create(&self, owner: &OwnerHandle) -> RecordHandle;

    /// Fetch the record for an owner id, if one exists.
    fn get(&self, owner: OwnerId) -> Option<RecordHandle>;

    /// Whether an owner currently holds a record.
    fn contains(&self, owner: OwnerId) -> bool {
        self.get(owner).is_some()
    }

    /// Remove and return the record for an owner id.
    fn remove(&self, owner: OwnerId) -> Option<RecordHandle>;

    /// Ids of every owner currently holding a record.
    fn tracked_owners(&self) -> Vec<OwnerId>;

    /// Number of owners currently holding a record.
    fn len(&self) -> usize;

    /// True when no owner holds a record.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct WeakSlot {
    owner: Weak<dyn crate::owner::Owner>,
    record: RecordHandle,
}

/// Production store: weak owner association.
///
/// Slots hold `Weak` owner handles, so the store never keeps a destroyed
/// owner alive. Slots whose owner was dropped without the host firing its
/// destruction hook are reaped lazily; their timers were cancelled by
/// nobody, which the reap logs — that situation is a host contract
/// violation, not normal operation.
#[derive(Default)]
pub struct WeakOwnerStore {
    slots: Mutex<HashMap<OwnerId, WeakSlot>>,
}

impl WeakOwnerStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reap_dead(slots: &mut HashMap<OwnerId, WeakSlot>) {
        slots.retain(|owner_id, slot| {
            let alive = slot.owner.strong_count() > 0;
            if !alive {
                debug!(owner = %owner_id, "reaping record for dropped owner (destruction hook never fired)");
            }
            alive
        });
    }
}

impl OwnerStore for WeakOwnerStore {
    fn get_or_create(&self, owner: &OwnerHandle) -> RecordHandle {
        let mut slots = self.slots.lock().expect("owner store poisoned");
        let slot = slots
            .entry(owner.owner_id())
            .or_insert_with(|| WeakSlot {
                owner: Arc::downgrade(owner),
                record: Arc::new(Mutex::new(OwnerRecord::default())),
            });
        Arc::clone(&slot.record)
    }

    fn get(&self, owner: OwnerId) -> Option<RecordHandle> {
        let slots = self.slots.lock().expect("owner store poisoned");
        slots.get(&owner).map(|slot| Arc::clone(&slot.record))
    }

    fn remove(&self, owner: OwnerId) -> Option<RecordHandle> {
        let mut slots = self.slots.lock().expect("owner store poisoned");
        slots.remove(&owner).map(|slot| slot.record)
    }

    fn tracked_owners(&self) -> Vec<OwnerId> {
        let mut slots = self.slots.lock().expect("owner store poisoned");
        Self::reap_dead(&mut slots);
        slots.keys().copied().collect()
    }

    fn len(&self) -> usize {
        let mut slots = self.slots.lock().expect("owner store poisoned");
        Self::reap_dead(&mut slots);
        slots.len()
    }
}

struct StrongSlot {
    #[allow(dead_code)]
    owner: OwnerHandle,
    record: RecordHandle,
}

/// Test store: strong, enumerable owner association.
///
/// Keeps every scheduled-against owner alive so tests can assert on record
/// contents after tasks fire. Never use in production — it defeats the
/// non-owning guarantee.
#[derive(Default)]
pub struct StrongOwnerStore {
    slots: Mutex<HashMap<OwnerId, StrongSlot>>,
}

impl StrongOwnerStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OwnerStore for StrongOwnerStore {
    fn get_or_create(&self, owner: &OwnerHandle) -> RecordHandle {
        let mut slots = self.slots.lock().expect("owner store poisoned");
        let slot = slots
            .entry(owner.owner_id())
            .or_insert_with(|| StrongSlot {
                owner: Arc::clone(owner),
                record: Arc::new(Mutex::new(OwnerRecord::default())),
            });
        Arc::clone(&slot.record)
    }

    fn get(&self, owner: OwnerId) -> Option<RecordHandle> {
        let slots = self.slots.lock().expect("owner store poisoned");
        slots.get(&owner).map(|slot| Arc::clone(&slot.record))
    }

    fn remove(&self, owner: OwnerId) -> Option<RecordHandle> {
        let mut slots = self.slots.lock().expect("owner store poisoned");
        slots.remove(&owner).map(|slot| slot.record)
    }

    fn tracked_owners(&self) -> Vec<OwnerId> {
        let slots = self.slots.lock().expect("owner store poisoned");
        slots.keys().copied().collect()
    }

    fn len(&self) -> usize {
        self.slots.lock().expect("owner store poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Owner;
    use crate::task::TaskFn;

    struct Dummy {
        id: OwnerId,
    }

    impl Owner for Dummy {
        fn owner_id(&self) -> OwnerId {
            self.id
        }
        fn is_destroyed(&self) -> bool {
            false
        }
        fn lookup_task(&self, _name: &str) -> Option<TaskFn> {
            None
        }
    }

    fn dummy() -> OwnerHandle {
        Arc::new(Dummy { id: OwnerId::next() })
    }

    #[test]
    fn slot_registration_before_fire_tracks_id() {
        let slot = TimerSlot::new();
        assert!(slot.register(TimerId::from_raw(1)));
        assert_eq!(slot.take_fired(), Some(TimerId::from_raw(1)));
        // A second fire (cannot happen in practice) finds nothing.
        assert_eq!(slot.take_fired(), None);
    }

    #[test]
    fn slot_fire_before_registration_suppresses_tracking() {
        let slot = TimerSlot::new();
        assert_eq!(slot.take_fired(), None);
        assert!(!slot.register(TimerId::from_raw(2)));
    }

    #[test]
    fn record_sweep_drains_everything() {
        let mut record = OwnerRecord::default();
        record.track_timer(TimerId::from_raw(1));
        record.track_timer(TimerId::from_raw(2));
        let wrapped: TaskFn = Arc::new(|_args| {});
        record.debounces.insert(
            "a".to_string(),
            DebounceEntry {
                name: "a".to_string(),
                wrapped: Arc::clone(&wrapped),
                current_timer: TimerId::from_raw(3),
            },
        );
        record.throttles.insert(
            "b".to_string(),
            ThrottleEntry {
                name: "b".to_string(),
                wrapped,
                window_timer: TimerId::from_raw(4),
            },
        );

        let swept = record.drain_for_sweep();
        assert_eq!(swept.total(), 4);
        assert!(record.is_idle());
    }

    #[test]
    fn weak_store_reaps_dropped_owners() {
        let store = WeakOwnerStore::new();
        let keep = dummy();
        let _keep_record = store.get_or_create(&keep);
        {
            let transient = dummy();
            let _record = store.get_or_create(&transient);
            assert_eq!(store.len(), 2);
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.tracked_owners(), vec![keep.owner_id()]);
    }

    #[test]
    fn strong_store_keeps_owner_and_enumerates() {
        let store = StrongOwnerStore::new();
        let id = {
            let transient = dummy();
            let _record = store.get_or_create(&transient);
            transient.owner_id()
        };
        // Still enumerable after the caller dropped its handle.
        assert_eq!(store.tracked_owners(), vec![id]);
        assert!(store.get(id).is_some());
        assert!(store.remove(id).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn get_or_create_returns_same_record() {
        let store = WeakOwnerStore::new();
        let owner = dummy();
        let first = store.get_or_create(&owner);
        let second = store.get_or_create(&owner);
        assert!(Arc::ptr_eq(&first, &second));
    }
}

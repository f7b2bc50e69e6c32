//! Owner identity and host lifecycle integration.
//!
//! An *owner* is any host object whose lifetime gates task execution. The
//! registry never holds a strong reference to one — owners are associated
//! through an [`OwnerId`] plus a `Weak` handle, so destroying the owner is
//! never blocked or delayed by outstanding scheduled work.
//!
//! The host signals destruction through [`LifecycleHost`]: the core
//! registers a one-shot cleanup callback for each owner (lazily, on the
//! first scheduling call), and the host guarantees to invoke it exactly
//! once before the owner is relinquished.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::task::TaskFn;

/// Process-wide allocator for owner identities.
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of an owner.
///
/// Owners are identity-compared, never value-compared: two owners with
/// equal state are still distinct schedule targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a fresh, process-unique owner identity.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Rehydrate an identity from its raw value.
    ///
    /// Intended for diagnostics and tests; scheduling against an id that
    /// was never allocated behaves like scheduling against an unknown
    /// owner.
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

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A host object whose lifetime gates scheduled work.
///
/// Implementations expose three things: a stable identity, the destroyed
/// observable, and the named-task table used for late-bound resolution.
/// `lookup_task` is consulted at *fire* time as well as registration time,
/// so reassigning a name between the two changes what runs.
pub trait Owner: Send + Sync {
    /// Stable identity for this owner instance.
    fn owner_id(&self) -> OwnerId;

    /// Whether the host has destroyed this owner.
    ///
    /// Observed at every scheduling call; a destroyed owner is rejected
    /// with [`Error::DestroyedOwner`](crate::Error::DestroyedOwner).
    fn is_destroyed(&self) -> bool;

    /// Resolve a task name to a callable, if the owner currently carries
    /// one under that name.
    fn lookup_task(&self, name: &str) -> Option<TaskFn>;
}

/// One-shot cleanup callback registered per owner.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// Host-side destruction notification surface.
///
/// The core calls [`register_destruction_hook`](Self::register_destruction_hook)
/// at most once per owner. The host must invoke the supplied cleanup
/// exactly once, before the owner becomes unreachable for scheduling
/// purposes. Invoking it is safe even when nothing was ever scheduled.
pub trait LifecycleHost: Send + Sync {
    /// Register the cleanup to run when `owner` is destroyed.
    fn register_destruction_hook(&self, owner: OwnerId, cleanup: CleanupFn);
}

/// Convenience alias for the shared owner handle the façade accepts.
pub type OwnerHandle = Arc<dyn Owner>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ids_are_unique_and_monotonic() {
        let a = OwnerId::next();
        let b = OwnerId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn owner_id_display_matches_raw() {
        let id = OwnerId::from_raw(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_u64(), 42);
    }

    #[test]
    fn owner_id_serde_is_transparent() {
        let id = OwnerId::from_raw(9);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "9");
        let back: OwnerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

//! Error types for tether-core
//!
//! Every validation error is raised synchronously at the call site, before
//! any timer is registered with the primitive scheduler — a failed call
//! never leaves partial registration behind.
//!
//! Cancellation of an unknown or already-fired timer identifier is *not* an
//! error anywhere in this crate; callers routinely race cancellation against
//! natural firing, so those paths are idempotent no-ops.

use thiserror::Error;

use crate::owner::OwnerId;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tether-core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Scheduling was attempted against an owner whose destruction hook has
    /// already fired (or whose host reports it destroyed). Fatal to the
    /// call — silently dropping work would hide lifecycle bugs.
    #[error("owner {owner} is destroyed; refusing to schedule new work")]
    DestroyedOwner {
        /// Owner the call targeted.
        owner: OwnerId,
    },

    /// A named task did not resolve to a callable on the owner.
    #[error("task `{name}` is not a callable on owner {owner}")]
    InvalidTask {
        /// Owner the lookup ran against.
        owner: OwnerId,
        /// Name that failed to resolve.
        name: String,
    },

    /// A queue dispatch targeted an empty queue name.
    #[error("queue name must be non-empty")]
    InvalidQueue,

    /// A queue dispatch targeted a reserved queue.
    #[error("queue `{queue}` is reserved for post-render work")]
    ReservedQueue {
        /// The reserved queue that was targeted.
        queue: String,
    },

    /// A debounce/throttle wait argument was missing, negative, or not an
    /// integer. The trailing-argument convention is validated hard rather
    /// than coerced.
    #[error("invalid wait argument: {reason}")]
    InvalidDelay {
        /// Human-readable description of what was wrong with the wait.
        reason: String,
    },
}

impl Error {
    /// Stable machine-readable code for log correlation.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DestroyedOwner { .. } => "destroyed_owner",
            Self::InvalidTask { .. } => "invalid_task",
            Self::InvalidQueue => "invalid_queue",
            Self::ReservedQueue { .. } => "reserved_queue",
            Self::InvalidDelay { .. } => "invalid_delay",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offender() {
        let err = Error::InvalidTask {
            owner: OwnerId::from_raw(7),
            name: "refresh".to_string(),
        };
        assert!(err.to_string().contains("refresh"));
        assert!(err.to_string().contains('7'));
        assert_eq!(err.code(), "invalid_task");
    }

    #[test]
    fn reserved_queue_message_names_queue() {
        let err = Error::ReservedQueue {
            queue: "after_render".to_string(),
        };
        assert!(err.to_string().contains("after_render"));
        assert_eq!(err.code(), "reserved_queue");
    }
}

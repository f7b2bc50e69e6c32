//! Task representation and late-bound resolution.
//!
//! A task is either a callable handed in directly or a *name* that resolves
//! to a callable on the owner. Named tasks are resolved through a single
//! [`resolve`] step immediately before each firing, not at registration
//! time — reassigning the named slot on the owner before the timer fires
//! changes what runs.
//!
//! Task arguments are dynamic [`serde_json::Value`] lists. Debounce and
//! throttle calls carry their wait as the trailing argument; the split is
//! validated hard by [`split_trailing_wait`] rather than coerced.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::owner::Owner;

/// Dynamic argument list passed to a task at invocation.
pub type TaskArgs = Vec<Value>;

/// A schedulable callable.
///
/// `Arc` pointer identity doubles as callable identity: the debounce
/// tracker reuses one `TaskFn` across a burst so the primitive scheduler
/// recognizes the burst as a single debounce.
pub type TaskFn = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// A task as accepted by the dispatch façade.
#[derive(Clone)]
pub enum Task {
    /// A callable captured at registration.
    Direct(TaskFn),
    /// A name resolved against the owner at fire time.
    Named(String),
}

impl Task {
    /// Wrap a closure as a direct task.
    pub fn direct<F>(f: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        Self::Direct(Arc::new(f))
    }

    /// Wrap a task name for late-bound resolution.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Short label for logs and error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Direct(_) => "<closure>",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Task::Direct(<closure>)"),
            Self::Named(name) => write!(f, "Task::Named({name:?})"),
        }
    }
}

impl From<&str> for Task {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Task {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Resolve a task to a callable against `owner`.
///
/// Direct tasks resolve to themselves. Named tasks consult the owner's
/// task table and fail with [`Error::InvalidTask`] when the name does not
/// currently map to a callable.
pub fn resolve(owner: &dyn Owner, task: &Task) -> Result<TaskFn> {
    match task {
        Task::Direct(callable) => Ok(Arc::clone(callable)),
        Task::Named(name) => owner.lookup_task(name).ok_or_else(|| Error::InvalidTask {
            owner: owner.owner_id(),
            name: name.clone(),
        }),
    }
}

/// Split the trailing wait off a debounce/throttle argument list.
///
/// The last element must be a non-negative integer number of milliseconds;
/// anything else — missing, negative, fractional, or non-numeric — is an
/// [`Error::InvalidDelay`]. The remaining prefix is returned as the task's
/// argument list.
pub fn split_trailing_wait(mut args: TaskArgs) -> Result<(TaskArgs, u64)> {
    let Some(tail) = args.pop() else {
        return Err(Error::InvalidDelay {
            reason: "missing trailing wait argument".to_string(),
        });
    };
    let wait = wait_from_value(&tail)?;
    Ok((args, wait))
}

fn wait_from_value(value: &Value) -> Result<u64> {
    let Value::Number(number) = value else {
        return Err(Error::InvalidDelay {
            reason: format!("trailing wait must be a number, got {value}"),
        });
    };
    if let Some(wait) = number.as_u64() {
        return Ok(wait);
    }
    // Integral floats (30.0) are accepted; fractional or negative are not.
    if let Some(float) = number.as_f64() {
        if float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64 {
            return Ok(float as u64);
        }
        if float < 0.0 {
            return Err(Error::InvalidDelay {
                reason: format!("wait must be non-negative, got {float}"),
            });
        }
    }
    Err(Error::InvalidDelay {
        reason: format!("wait must be a non-negative integer, got {number}"),
    })
}

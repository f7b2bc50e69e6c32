//! tether-core: lifecycle-bound task scheduling
//!
//! Binds deferred, queued, debounced, and throttled units of work to the
//! lifetime of an owning object: no unit ever executes after its owner is
//! destroyed, and destruction releases all pending work — no leaked
//! timers, no leaked callback closures.
//!
//! # Architecture
//!
//! ```text
//! TaskBinder (façade) → resolve task → OwnerRecord (track id)
//!                                           ↓
//!                               PrimitiveScheduler (external)
//!                                           ↓ fire
//!                               self-clean → invoke against owner
//!
//! LifecycleHost destruction hook → sweep: cancel + clear everything
//! ```
//!
//! # Modules
//!
//! - `binder`: the dispatch façade — `run_task`, `schedule_task`,
//!   `debounce_task`, `throttle_task`, and the cancellation surface
//! - `registry`: per-owner records and the injectable owner store
//! - `scheduler`: the primitive scheduler contract (`TimerId`,
//!   `CoalesceKey`, `PrimitiveScheduler`)
//! - `owner`: owner identity and the host lifecycle traits
//! - `task`: task representation and late-bound resolution
//! - `simulation`: deterministic doubles (`ManualScheduler`,
//!   `ManualHost`, `SimOwner`) for tests and reference semantics
//! - `runtime`: tokio-backed primitive scheduler adapter
//! - `logging`: tracing-subscriber setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod binder;
pub mod error;
pub mod logging;
pub mod owner;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod simulation;
pub mod task;

pub use binder::{BinderConfig, BinderMetrics, BinderSnapshot, TaskBinder};
pub use error::{Error, Result};
pub use owner::{LifecycleHost, Owner, OwnerHandle, OwnerId};
pub use scheduler::{CoalesceKey, PrimitiveScheduler, TimerId};
pub use task::{Task, TaskArgs, TaskFn};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

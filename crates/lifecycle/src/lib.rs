//! Policy-driven lifecycle state machine over long-lived, named resources.
//!
//! A *policy* is a named, ordered list of steps; each resource referencing
//! a policy carries a persisted step pointer (the phase/action/step
//! triple) in its metadata. The [`LifecycleRunner`] is the transition
//! function: given a trigger cause it resolves the resource's current
//! step, pattern-matches exhaustively on the step's capability, and either
//! submits a metadata-only update task, awaits an external async
//! operation, or stops at the terminal step.
//!
//! Key properties:
//!
//! - **Race safety without locks**: every transition is a compare-and-move
//!   task carrying the expected current key; executed under the serialized
//!   cluster-state executor, a stale move is a silent no-op, so duplicate
//!   and racing triggers can never double-advance a resource.
//! - **Cause-based filtering**: cluster-state-change notifications (which
//!   fire for every metadata bump, including this engine's own) may only
//!   advance metadata-only steps; only schedule ticks and callback
//!   completions initiate new async side-effecting work.
//! - **Synchronous cascade**: a committed transition re-runs the policy
//!   with a callback cause, so chains of metadata-only steps advance
//!   without waiting for another external trigger.
//!
//! Concrete step behaviors (rollover, shrink, delete, ...) are plugged in
//! through the traits in [`step`]; this crate only sequences them.

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod registry;
pub mod runner;
pub mod service;
pub mod step;
pub mod tasks;

pub use error::{Error, Result};
pub use registry::StepRegistry;
pub use runner::{LifecycleRunner, TriggerCause};
pub use service::{LifecycleService, DEFAULT_POLL_INTERVAL};
pub use step::{
    AsyncActionStep, AsyncWaitStep, ClusterStateActionStep, ClusterStateWaitStep, Step, StepKey,
    StepKind,
};
pub use tasks::{ExecuteStepTask, MoveToStepTask, SharedStepRegistry};

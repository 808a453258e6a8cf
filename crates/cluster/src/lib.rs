//! Versioned, immutable cluster-state snapshots and the serialized
//! compare-and-swap update executor.
//!
//! The cluster metadata is the only shared mutable resource in the engine,
//! and it is never mutated in place: every change is a
//! [`ClusterStateUpdateTask`] computing a new snapshot from the current
//! one, queued to the single-writer executor inside [`ClusterService`].
//! Tasks are applied one at a time in submission order, each observing the
//! result of all previously applied tasks; a task returning an unchanged
//! state is a silent no-op (no version bump, no listener notification),
//! which is what makes stale compare-and-move requests safe.
//!
//! Per-resource lifecycle progress is persisted as three sibling string
//! settings (phase, action, step) that are either all present or all
//! absent — see [`LifecycleExecutionState`].

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod moves;
pub mod state;
pub mod task;

pub use error::{Error, Result};
pub use moves::UpdateSettingsTask;
pub use state::{
    ClusterState, LifecycleExecutionState, ResourceMetadata, LIFECYCLE_ACTION, LIFECYCLE_PHASE,
    LIFECYCLE_POLICY, LIFECYCLE_STEP,
};
pub use task::{ClusterService, ClusterStateListener, ClusterStateUpdateTask, UpdateOutcome};

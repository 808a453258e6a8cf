//! Scoped settings with transactional dynamic reconfiguration.
//!
//! This crate provides the configuration layer of the lifecycle engine:
//!
//! - **Setting descriptors**: dot-segmented keys with a validated grammar,
//!   a scope (cluster or index), a dynamic/static flag, and optional value
//!   validators. Group settings own every key under a dot-terminated
//!   prefix.
//! - **Immutable snapshots**: settings are immutable key-to-string maps
//!   built through builders; reconciliation always compares a proposed
//!   "current" snapshot against the last-applied "previous" snapshot.
//! - **Transactional reconciliation**: a proposed delta is validated
//!   against every registered updater before any updater's side effect
//!   runs — compute all, then commit all. A dry run collects every
//!   failure so operators see all problems in one pass.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidemark_settings::{
//!     Scope, Setting, SettingRegistry, Settings, SettingsReconciler,
//! };
//!
//! let mut registry = SettingRegistry::new(Scope::Cluster);
//! let poll = Setting::leaf("engine.poll_interval", Scope::Cluster).dynamic();
//! registry.register(poll.clone())?;
//!
//! let mut reconciler = SettingsReconciler::new(Arc::new(registry), Settings::new());
//! reconciler.register_update_consumer(&poll, |value| {
//!     // publish the new interval
//! })?;
//!
//! let mut proposed = Settings::builder();
//! proposed.put("engine.poll_interval", "30s");
//! reconciler.apply(&proposed.build())?;
//! ```

#![forbid(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod error;
pub mod reconciler;
pub mod registry;
pub mod setting;
pub mod snapshot;
pub mod updater;

pub use error::{Error, Result, UpdaterFailure};
pub use reconciler::{apply_deletes, update_dynamic_settings, SettingsReconciler};
pub use registry::SettingRegistry;
pub use setting::{Scope, Setting, SettingKind, GROUP_KEY_PATTERN, LEAF_KEY_PATTERN};
pub use snapshot::{simple_match, Settings, SettingsBuilder, SettingsPatch};
pub use updater::{CommitFn, ConsumerUpdater, SettingUpdater};

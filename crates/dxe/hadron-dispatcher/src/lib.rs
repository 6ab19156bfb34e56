//! DXE driver dispatcher.
//!
//! Discovers drivers in firmware volumes, tracks the dependency state of each
//! one, and loads and starts them in an order that never runs a driver before
//! the protocols its dependency expression names are available.
//!
//! # Architecture
//!
//! ```text
//!   VolumeSource ──next_volume()──▶ volume arrival ──register()──▶ DriverRegistry
//!                                        │ Apriori                     │
//!                                        ▼                             ▼ rescan
//!                                  ScheduledQueue ◀── before/after ── Dispatcher
//!                                        │                             ▲
//!                                        └──── drain: load + start ────┘
//!                                                   ImageLoader
//! ```
//!
//! - [`registry`] - append-only [`DriverRegistry`] of every discovered driver
//! - [`queue`] - [`ScheduledQueue`] of drivers ready to load and start
//! - [`volume`] - [`VolumeTracker`] deduplicating firmware volumes by handle and name
//! - [`engine`] - the [`Dispatcher`] and its drain/rescan loop
//! - `arrival` - firmware volume discovery and Apriori processing
//! - [`services`] - traits for the firmware services the dispatcher drives
//!
//! # Locking
//!
//! Registry, queue, and volume tracker live behind a single
//! [`TplLock`](hadron_core::sync::TplLock) raised to `TPL_HIGH_LEVEL`. The
//! lock is never held across a call into a firmware service, so a driver's
//! entry point may call back into the dispatcher (to report new volumes,
//! schedule or trust drivers). A nested [`Dispatcher::dispatch`] call returns
//! [`DispatchError::AlreadyRunning`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod arrival;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod handle;
pub mod queue;
pub mod registry;
pub mod services;
pub mod volume;

#[cfg(test)]
mod mock;

pub use config::{DispatcherConfig, ExtractedImage};
pub use engine::{DispatchReport, Dispatcher};
pub use entry::{Classification, DispatchOrder, DriverEntry, DriverState};
pub use error::{DispatchError, LoadError};
pub use handle::{DriverId, ImageHandle, VolumeHandle};
pub use queue::ScheduledQueue;
pub use registry::DriverRegistry;
pub use services::{
    DependencyEvaluator, DispatchObserver, FirmwareVolume, FvFile, ImageLoader, Section,
    SecurityPolicy, Services, Verdict, VolumeSource, classify_depex,
};
pub use volume::{VolumeRecord, VolumeTracker};

//! Core synchronization and logging primitives for the Hadron DXE phase.
//!
//! This crate contains the host-testable pieces the dispatcher builds on:
//! task priority level tracking, the TPL-raising critical section used to
//! guard dispatcher state, and the sink that routes `log` records to the
//! firmware console.
//!
//! By living outside the dispatcher crate, these types can be tested with
//! `cargo test` on the host without a firmware target.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod log;
pub mod sync;
pub mod tpl;

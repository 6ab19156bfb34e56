//! PI/UEFI firmware types for the Hadron DXE dispatcher.
//!
//! This crate holds the plain data types shared between the dispatcher and the
//! firmware services it drives: identifiers, status codes, firmware file system
//! (FFS) constants, and section authentication flags. Nothing here touches
//! hardware or calls through firmware function pointers, so everything is
//! usable and testable on the host.
//!
//! # Modules
//!
//! - [`guid`] - GUID type and the well-known PI GUIDs the dispatcher needs
//! - [`status`] - Status code type with the codes the dispatcher produces or consumes
//! - [`ffs`] - Firmware file types, section types, and dependency-expression opcodes
//! - [`auth`] - Section authentication status flags

#![cfg_attr(not(test), no_std)]

pub mod auth;
pub mod ffs;
pub mod guid;
pub mod status;

pub use auth::AuthStatus;
pub use guid::EfiGuid;
pub use status::EfiStatus;

/// A task priority level.
pub type EfiTpl = usize;

/// UEFI Task Priority Level constants.
pub mod tpl {
    use super::EfiTpl;

    /// Application level (lowest priority).
    pub const APPLICATION: EfiTpl = 4;
    /// Callback level. Protocol notifications run here.
    pub const CALLBACK: EfiTpl = 8;
    /// Notify level.
    pub const NOTIFY: EfiTpl = 16;
    /// High level. Interrupts are masked; used by the dispatcher lock.
    pub const HIGH_LEVEL: EfiTpl = 31;
}

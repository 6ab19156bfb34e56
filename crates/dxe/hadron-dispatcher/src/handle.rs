//! Type-safe handles for dispatcher resources.
//!
//! These newtypes prevent accidental mixing of firmware volume handles, image
//! handles, and registry indices at compile time.

use core::fmt;

/// Handle of a firmware volume, as handed out by the volume source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VolumeHandle(u64);

impl VolumeHandle {
    /// Creates a new `VolumeHandle`.
    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    /// Returns the raw `u64` value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fv{}", self.0)
    }
}

/// Handle of a loaded image, as handed out by the image loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ImageHandle(u64);

impl ImageHandle {
    /// Creates a new `ImageHandle`.
    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    /// Returns the raw `u64` value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image{}", self.0)
    }
}

/// Index of a driver in the [`DriverRegistry`](crate::DriverRegistry).
///
/// Stable for the whole boot: the registry never removes or reorders entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DriverId(usize);

impl DriverId {
    /// Creates a new `DriverId`.
    pub const fn new(val: usize) -> Self {
        Self(val)
    }

    /// Returns the registry index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

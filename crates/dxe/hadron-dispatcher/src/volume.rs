//! Firmware volume bookkeeping.
//!
//! Firmware volumes can be reported more than once: the same handle may be
//! announced again, and the same volume can show up under a second handle
//! (for example a copy shadowed to memory). The tracker admits each handle
//! once and each volume name once.

use alloc::vec::Vec;

use uefi::EfiGuid;

use crate::handle::VolumeHandle;

/// A volume the dispatcher has processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeRecord {
    /// Handle the volume arrived on.
    pub handle: VolumeHandle,
    /// Name GUID from the volume's extended header.
    pub name: Option<EfiGuid>,
}

/// Outcome of [`VolumeTracker::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; the volume is now recorded.
    New,
    /// The handle was already processed.
    AlreadyProcessed,
    /// Another handle already carries a volume with the same name.
    DuplicateName {
        /// Handle of the volume processed first.
        original: VolumeHandle,
    },
}

/// Set of processed firmware volumes.
#[derive(Debug, Default)]
pub struct VolumeTracker {
    records: Vec<VolumeRecord>,
}

impl VolumeTracker {
    /// Creates an empty tracker.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Number of processed volumes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no volume has been processed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` if `handle` was already processed.
    pub fn contains(&self, handle: VolumeHandle) -> bool {
        self.records.iter().any(|record| record.handle == handle)
    }

    /// Returns the handle of the processed volume named `name`.
    pub fn find_by_name(&self, name: &EfiGuid) -> Option<VolumeHandle> {
        self.records
            .iter()
            .find(|record| record.name.as_ref() == Some(name))
            .map(|record| record.handle)
    }

    /// Iterates over processed volumes in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &VolumeRecord> {
        self.records.iter()
    }

    /// Records `handle` unless it, or a volume with the same name, was seen before.
    ///
    /// Volumes without a name are only deduplicated by handle. A duplicate is
    /// not recorded.
    pub fn admit(&mut self, handle: VolumeHandle, name: Option<EfiGuid>) -> Admission {
        if self.contains(handle) {
            return Admission::AlreadyProcessed;
        }
        if let Some(original) = name.as_ref().and_then(|name| self.find_by_name(name)) {
            return Admission::DuplicateName { original };
        }
        self.records.push(VolumeRecord { handle, name });
        Admission::New
    }
}

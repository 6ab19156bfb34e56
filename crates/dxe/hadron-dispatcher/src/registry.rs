//! Registry of discovered drivers.
//!
//! Every driver found in any firmware volume gets an entry here, in discovery
//! order. Entries are never removed or reordered, so a [`DriverId`] stays valid
//! for the whole boot and rescans always walk drivers in discovery order.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use uefi::{EfiGuid, EfiStatus};
use uefi::ffs::SectionType;

use crate::entry::{DependencyRead, DriverEntry, DriverState};
use crate::handle::{DriverId, VolumeHandle};
use crate::services::{DependencyEvaluator, FirmwareVolume};

/// Append-only list of discovered drivers.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    entries: Vec<DriverEntry>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no driver has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `id`.
    pub fn get(&self, id: DriverId) -> Option<&DriverEntry> {
        self.entries.get(id.index())
    }

    /// Iterates over all entries in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &DriverEntry> {
        self.entries.iter()
    }

    /// Finds the driver named `file` in `volume`.
    pub fn find(&self, volume: VolumeHandle, file: &EfiGuid) -> Option<DriverId> {
        self.entries
            .iter()
            .find(|entry| entry.volume() == volume && entry.file_name() == *file)
            .map(DriverEntry::id)
    }

    /// Finds the driver named `file` in `volume` if it is in `state`.
    pub fn find_in_state(
        &self,
        volume: VolumeHandle,
        file: &EfiGuid,
        state: DriverState,
    ) -> Option<DriverId> {
        self.find(volume, file)
            .filter(|&id| self.entries[id.index()].state() == state)
    }

    /// Appends `entry` and returns its id.
    pub(crate) fn insert(&mut self, mut entry: DriverEntry) -> DriverId {
        let id = DriverId::new(self.entries.len());
        entry.set_id(id);
        self.entries.push(entry);
        id
    }
}

impl Index<DriverId> for DriverRegistry {
    type Output = DriverEntry;

    fn index(&self, id: DriverId) -> &DriverEntry {
        &self.entries[id.index()]
    }
}

impl IndexMut<DriverId> for DriverRegistry {
    fn index_mut(&mut self, id: DriverId) -> &mut DriverEntry {
        &mut self.entries[id.index()]
    }
}

/// Reads and classifies the dependency section of `file`.
///
/// A missing section means the driver has no expression. A protocol error
/// means the section exists but cannot be extracted yet.
pub(crate) fn read_dependency(
    fv: &dyn FirmwareVolume,
    file: &EfiGuid,
    evaluator: &dyn DependencyEvaluator,
) -> DependencyRead {
    match fv.read_section(file, SectionType::DXE_DEPEX) {
        Ok(section) => {
            let class = evaluator.preprocess(&section.data);
            DependencyRead::Expression {
                depex: Arc::from(section.data),
                class,
            }
        }
        Err(EfiStatus::PROTOCOL_ERROR) => DependencyRead::ProtocolError,
        Err(_) => DependencyRead::Absent,
    }
}

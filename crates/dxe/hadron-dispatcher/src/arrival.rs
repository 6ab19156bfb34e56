//! Firmware volume arrival.
//!
//! When a volume shows up the dispatcher records it, walks its files in the
//! configured type order, registers every driver, and then applies the
//! volume's Apriori list. Nested volume images without a dependency
//! expression are expanded on the spot; the resulting volume arrives through
//! the volume source like any other.

use alloc::sync::Arc;
use alloc::vec::Vec;

use uefi::ffs::{FvFileType, SectionType};
use uefi::guid::GUID_SIZE;
use uefi::{EfiGuid, EfiStatus};

use crate::engine::Dispatcher;
use crate::entry::{DriverEntry, DriverState};
use crate::error::DispatchError;
use crate::handle::{DriverId, VolumeHandle};
use crate::registry::read_dependency;
use crate::services::{FirmwareVolume, Verdict};
use crate::volume::Admission;

impl Dispatcher {
    /// Processes every volume the volume source has queued.
    ///
    /// Returns the number of volumes that were new.
    pub fn process_volume_arrivals(&self) -> usize {
        let mut processed = 0;
        while let Some(handle) = self.services.volumes.next_volume() {
            if self.process_volume(handle) {
                processed += 1;
            }
        }
        processed
    }

    /// Discovers the drivers in the volume behind `handle`.
    ///
    /// Returns `false` if the handle was already processed, carries no
    /// readable volume, or carries a volume whose name was already seen.
    pub fn process_volume(&self, handle: VolumeHandle) -> bool {
        if self.state.lock().volumes.contains(handle) {
            log::trace!("Dispatcher: {handle} already processed");
            return false;
        }

        let fv = self.services.volumes.open(handle);
        let name = fv.as_ref().and_then(|fv| fv.name());

        match self.state.lock().volumes.admit(handle, name) {
            Admission::New => {}
            Admission::AlreadyProcessed => return false,
            Admission::DuplicateName { original } => {
                log::warn!(
                    "Dispatcher: {handle} carries the same volume as {original}, skipping"
                );
                return false;
            }
        }

        let Some(fv) = fv else {
            log::warn!("Dispatcher: no firmware volume on {handle}");
            return false;
        };

        match name {
            Some(name) => log::info!("Dispatcher: processing {handle} ({name})"),
            None => log::info!("Dispatcher: processing {handle}"),
        }

        self.discover_files(handle, name, &fv);
        let forced = self.apply_apriori(handle, fv.as_ref());
        if forced > 0 {
            log::debug!("Dispatcher: {forced} drivers from {handle} forced by Apriori");
        }
        true
    }

    fn discover_files(
        &self,
        handle: VolumeHandle,
        name: Option<EfiGuid>,
        fv: &Arc<dyn FirmwareVolume>,
    ) {
        for &file_type in &self.config.file_types {
            for file in fv.files(file_type) {
                match file.file_type {
                    FvFileType::DXE_CORE => {
                        let mut state = self.state.lock();
                        match state.hosting_image {
                            Some((first, _)) => log::debug!(
                                "Dispatcher: extra DXE core image {} in {handle}, keeping {first}",
                                file.name
                            ),
                            None => {
                                log::debug!("Dispatcher: DXE core image {} in {handle}", file.name);
                                state.hosting_image = Some((handle, file.name));
                            }
                        }
                    }
                    FvFileType::FIRMWARE_VOLUME_IMAGE => {
                        self.discover_volume_image(handle, name, fv, file.name);
                    }
                    file_type => {
                        if let Err(err) = self.register(handle, fv.clone(), file.name, file_type) {
                            log::debug!("Dispatcher: {err}");
                        }
                    }
                }
            }
        }
    }

    fn discover_volume_image(
        &self,
        handle: VolumeHandle,
        name: Option<EfiGuid>,
        fv: &Arc<dyn FirmwareVolume>,
        file: EfiGuid,
    ) {
        if name.is_some_and(|name| self.config.is_extracted(&name, &file)) {
            log::debug!("Dispatcher: volume image {file} in {handle} already extracted");
            return;
        }

        if fv.read_section(&file, SectionType::DXE_DEPEX).is_ok() {
            if let Err(err) =
                self.register(handle, fv.clone(), file, FvFileType::FIRMWARE_VOLUME_IMAGE)
            {
                log::debug!("Dispatcher: {err}");
            }
            return;
        }

        if let Err(status) = self.produce_volume(handle, fv.as_ref(), &file) {
            log::warn!("Dispatcher: volume image {file} in {handle} not published: {status}");
        }
    }

    /// Registers file `file` of `volume` as a driver.
    ///
    /// The dependency section is read and classified right away. Volume
    /// images registered this way are expanded instead of loaded once their
    /// expression is satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AlreadyStarted`] if the file is already
    /// registered from this volume.
    pub fn register(
        &self,
        volume: VolumeHandle,
        fv: Arc<dyn FirmwareVolume>,
        file: EfiGuid,
        file_type: FvFileType,
    ) -> Result<DriverId, DispatchError> {
        if self.state.lock().registry.find(volume, &file).is_some() {
            return Err(DispatchError::AlreadyStarted { volume, file });
        }

        let read = read_dependency(fv.as_ref(), &file, self.services.evaluator.as_ref());
        let mut entry = DriverEntry::new(volume, fv, file, file_type);
        entry.apply_dependency(read);

        let mut state = self.state.lock();
        if state.registry.find(volume, &file).is_some() {
            return Err(DispatchError::AlreadyStarted { volume, file });
        }
        let id = state.registry.insert(entry);
        log::trace!(
            "Dispatcher: registered {file} from {volume} as {id} ({})",
            state.registry[id].state()
        );
        Ok(id)
    }

    /// Queues the drivers named in `volume`'s Apriori file, in list order.
    ///
    /// Only `Dependent` drivers from the same volume are forced. Returns the
    /// number of drivers queued.
    fn apply_apriori(&self, volume: VolumeHandle, fv: &dyn FirmwareVolume) -> usize {
        let names = match fv.read_section(&self.config.apriori_file, SectionType::RAW) {
            Ok(section) => parse_apriori(&section.data),
            Err(status) => {
                log::trace!("Dispatcher: no Apriori file in {volume} ({status})");
                return 0;
            }
        };

        let mut state = self.state.lock();
        let mut forced = 0;
        for name in names {
            match state.registry.find(volume, &name) {
                Some(id) if state.registry[id].state() == DriverState::Dependent => {
                    state.enqueue(id);
                    forced += 1;
                }
                Some(id) => log::warn!(
                    "Dispatcher: Apriori entry {name} is {}, not forced",
                    state.registry[id].state()
                ),
                None => log::debug!("Dispatcher: Apriori entry {name} not found in {volume}"),
            }
        }
        forced
    }

    /// Publishes the volume image in file `file` of `parent`.
    ///
    /// The image is checked by the security policy, if one is installed,
    /// before the volume source sees it.
    pub(crate) fn produce_volume(
        &self,
        parent: VolumeHandle,
        fv: &dyn FirmwareVolume,
        file: &EfiGuid,
    ) -> Result<VolumeHandle, EfiStatus> {
        let section = fv.read_section(file, SectionType::FIRMWARE_VOLUME_IMAGE)?;

        if let Some(security) = &self.services.security {
            if let Verdict::Reject(status) = security.authenticate(section.auth, parent, file) {
                log::warn!("Dispatcher: volume image {file} in {parent} failed authentication");
                return Err(status);
            }
        }

        let handle = self.services.volumes.install(section, parent, *file)?;
        log::info!("Dispatcher: volume image {file} in {parent} published as {handle}");
        Ok(handle)
    }
}

/// Splits an Apriori section into file names.
///
/// A trailing partial GUID is ignored.
pub(crate) fn parse_apriori(data: &[u8]) -> Vec<EfiGuid> {
    data.chunks_exact(GUID_SIZE)
        .filter_map(EfiGuid::from_slice)
        .collect()
}

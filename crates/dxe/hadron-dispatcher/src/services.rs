//! Firmware services the dispatcher drives.
//!
//! The dispatcher owns no hardware and no image format. Everything it does to
//! the outside world goes through the traits in this module: reading firmware
//! volumes, loading and starting images, evaluating dependency expressions,
//! authenticating nested volumes, and announcing finished dispatch rounds.
//!
//! All methods are called with the dispatcher lock released, so an
//! implementation may call back into the [`Dispatcher`](crate::Dispatcher).

use alloc::sync::Arc;
use alloc::vec::Vec;

use uefi::ffs::{FvFileType, SectionType, depex};
use uefi::{AuthStatus, EfiGuid, EfiStatus};

use crate::entry::{Classification, DispatchOrder, DriverEntry};
use crate::error::LoadError;
use crate::handle::{ImageHandle, VolumeHandle};

/// A file listed in a firmware volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FvFile {
    /// File name GUID.
    pub name: EfiGuid,
    /// File type.
    pub file_type: FvFileType,
}

/// The data of one section read out of a firmware file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section payload, without the section header.
    pub data: Vec<u8>,
    /// How the file containing the section was authenticated.
    pub auth: AuthStatus,
}

/// Read access to one firmware volume.
pub trait FirmwareVolume: Send + Sync {
    /// Returns the volume's name GUID from its extended header, if it has one.
    fn name(&self) -> Option<EfiGuid>;

    /// Lists the files of type `file_type`, in volume order.
    ///
    /// [`FvFileType::ALL`] lists every file.
    fn files(&self, file_type: FvFileType) -> Vec<FvFile>;

    /// Reads the first section of type `section_type` from file `file`.
    ///
    /// # Errors
    ///
    /// - [`EfiStatus::NOT_FOUND`] if the file or section does not exist.
    /// - [`EfiStatus::PROTOCOL_ERROR`] if the section is encapsulated in a
    ///   format whose extractor is not available yet. The read may succeed
    ///   later.
    fn read_section(&self, file: &EfiGuid, section_type: SectionType) -> Result<Section, EfiStatus>;
}

/// Source of firmware volumes.
///
/// Volumes published by the platform, by started drivers, or by
/// [`install`](VolumeSource::install) are queued by the source and handed to
/// the dispatcher one at a time through [`next_volume`](VolumeSource::next_volume).
pub trait VolumeSource: Send + Sync {
    /// Takes the next volume published since the last call.
    fn next_volume(&self) -> Option<VolumeHandle>;

    /// Opens the volume behind `handle`.
    ///
    /// Returns `None` if the handle carries no readable volume.
    fn open(&self, handle: VolumeHandle) -> Option<Arc<dyn FirmwareVolume>>;

    /// Publishes the volume image in `section`, taken from file `file` of `parent`.
    ///
    /// The new volume is queued for [`next_volume`](VolumeSource::next_volume).
    ///
    /// # Errors
    ///
    /// Returns the status of the failed publication, e.g.
    /// [`EfiStatus::VOLUME_CORRUPTED`] for a malformed image.
    fn install(
        &self,
        section: Section,
        parent: VolumeHandle,
        file: EfiGuid,
    ) -> Result<VolumeHandle, EfiStatus>;
}

/// Loads and starts driver images.
pub trait ImageLoader: Send + Sync {
    /// Loads the image in file `file` of volume `volume`.
    ///
    /// # Errors
    ///
    /// [`LoadError::SecurityViolation`] if the security policy refused the
    /// image, [`LoadError::Failed`] for any other load failure.
    fn load(&self, volume: VolumeHandle, file: &EfiGuid) -> Result<ImageHandle, LoadError>;

    /// Runs a loaded image's entry point and returns its status.
    fn start(&self, image: ImageHandle) -> EfiStatus;
}

/// Evaluates dependency expressions.
pub trait DependencyEvaluator: Send + Sync {
    /// Classifies a freshly read dependency expression.
    ///
    /// The default implementation handles the standard leading opcodes, see
    /// [`classify_depex`].
    fn preprocess(&self, expression: &[u8]) -> Classification {
        classify_depex(expression)
    }

    /// Returns `true` if `driver` may be scheduled now.
    ///
    /// Every unordered `Dependent` driver is passed here on each rescan,
    /// including drivers whose file has no dependency section
    /// (`driver.depex() == None`). The evaluator decides for those too, e.g.
    /// by holding them back until the architectural protocols exist.
    /// Drivers ordered relative to another file, or waiting for an
    /// unreadable section to be retried, are never passed here.
    fn is_satisfied(&self, driver: &DriverEntry) -> bool;
}

/// Outcome of a [`SecurityPolicy`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The data may be used.
    Accept,
    /// The data must not be used; the status says why.
    Reject(EfiStatus),
}

/// Authenticates nested firmware volumes before they are published.
pub trait SecurityPolicy: Send + Sync {
    /// Checks the volume image in file `file` of `volume`, read with authentication status `auth`.
    fn authenticate(&self, auth: AuthStatus, volume: VolumeHandle, file: &EfiGuid) -> Verdict;
}

/// Receives dispatcher progress notifications.
pub trait DispatchObserver: Send + Sync {
    /// Called after each round of draining the scheduled queue.
    ///
    /// Platforms use this to signal the DXE dispatch event group.
    fn round_complete(&self, round: usize) {
        let _ = round;
    }
}

/// The set of services a [`Dispatcher`](crate::Dispatcher) is built on.
#[derive(Clone)]
pub struct Services {
    /// Firmware volume source.
    pub volumes: Arc<dyn VolumeSource>,
    /// Image loader.
    pub loader: Arc<dyn ImageLoader>,
    /// Dependency expression evaluator.
    pub evaluator: Arc<dyn DependencyEvaluator>,
    /// Nested volume authentication; absent until the security protocol is installed.
    pub security: Option<Arc<dyn SecurityPolicy>>,
    /// Round notifications.
    pub observer: Option<Arc<dyn DispatchObserver>>,
}

impl Services {
    /// Creates a service set without security policy or observer.
    pub fn new(
        volumes: Arc<dyn VolumeSource>,
        loader: Arc<dyn ImageLoader>,
        evaluator: Arc<dyn DependencyEvaluator>,
    ) -> Self {
        Self {
            volumes,
            loader,
            evaluator,
            security: None,
            observer: None,
        }
    }

    /// Adds a security policy for nested volumes.
    #[must_use]
    pub fn with_security(mut self, security: Arc<dyn SecurityPolicy>) -> Self {
        self.security = Some(security);
        self
    }

    /// Adds a round observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Classifies a dependency expression by its leading opcode.
///
/// - `SOR` makes the driver wait for an explicit schedule request.
/// - `BEFORE`/`AFTER` followed by a GUID orders the driver relative to that file.
/// - Anything else leaves the driver dependent on the expression alone.
#[must_use]
pub fn classify_depex(expression: &[u8]) -> Classification {
    let operand = || expression.get(1..).and_then(EfiGuid::from_slice);
    match expression.first().copied() {
        Some(depex::SOR) => Classification::Unrequested,
        Some(depex::BEFORE) => Classification::Dependent(operand().map(DispatchOrder::Before)),
        Some(depex::AFTER) => Classification::Dependent(operand().map(DispatchOrder::After)),
        _ => Classification::Dependent(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_operand(opcode: u8, target: EfiGuid) -> Vec<u8> {
        let mut bytes = vec![opcode];
        bytes.extend_from_slice(&target.to_bytes());
        bytes.push(depex::END);
        bytes
    }

    #[test]
    fn classify_schedule_on_request() {
        assert_eq!(
            classify_depex(&[depex::SOR, depex::TRUE, depex::END]),
            Classification::Unrequested
        );
    }

    #[test]
    fn classify_before_and_after() {
        let target = EfiGuid::new(0xa, 0, 0, [1; 8]);
        assert_eq!(
            classify_depex(&with_operand(depex::BEFORE, target)),
            Classification::Dependent(Some(DispatchOrder::Before(target)))
        );
        assert_eq!(
            classify_depex(&with_operand(depex::AFTER, target)),
            Classification::Dependent(Some(DispatchOrder::After(target)))
        );
    }

    #[test]
    fn classify_truncated_and_plain() {
        assert_eq!(
            classify_depex(&[depex::BEFORE, 1, 2]),
            Classification::Dependent(None)
        );
        assert_eq!(
            classify_depex(&[depex::TRUE, depex::END]),
            Classification::Dependent(None)
        );
        assert_eq!(classify_depex(&[]), Classification::Dependent(None));
    }
}

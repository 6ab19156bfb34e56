//! Driver entries and their state machine.
//!
//! ```text
//!  Unrequested ──schedule()──▶ Dependent ──satisfied / Apriori──▶ Scheduled
//!                                                                   │
//!                                   ┌──── security violation ───────┤
//!                                   ▼                               ▼
//!                               Untrusted ──trust()──▶ Scheduled  Initialized
//! ```
//!
//! `Initialized` is terminal and covers both started drivers and drivers whose
//! load failed. A driver is in the [`ScheduledQueue`](crate::ScheduledQueue)
//! exactly when its state is [`DriverState::Scheduled`].

use alloc::sync::Arc;
use core::fmt;

use uefi::EfiGuid;
use uefi::ffs::FvFileType;

use crate::handle::{DriverId, ImageHandle, VolumeHandle};
use crate::services::FirmwareVolume;

/// Dispatch state of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverState {
    /// Waiting for an explicit schedule request.
    Unrequested,
    /// Waiting for its dependency expression to be satisfied.
    Dependent,
    /// In the scheduled queue.
    Scheduled,
    /// Dispatched: started, or failed to load.
    Initialized,
    /// Refused by the security policy; waiting for an explicit trust request.
    Untrusted,
}

impl DriverState {
    /// Returns a short name for log output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unrequested => "unrequested",
            Self::Dependent => "dependent",
            Self::Scheduled => "scheduled",
            Self::Initialized => "initialized",
            Self::Untrusted => "untrusted",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placement of a driver relative to another file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchOrder {
    /// Run immediately before the named file.
    Before(EfiGuid),
    /// Run immediately after the named file.
    After(EfiGuid),
}

impl DispatchOrder {
    /// Returns the file this driver is ordered against.
    pub const fn target(self) -> EfiGuid {
        match self {
            Self::Before(target) | Self::After(target) => target,
        }
    }
}

/// Result of preprocessing a dependency expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Schedule on request.
    Unrequested,
    /// Dependent on the expression, optionally ordered against another file.
    Dependent(Option<DispatchOrder>),
}

/// Outcome of reading a driver's dependency section.
#[derive(Debug, Clone)]
pub(crate) enum DependencyRead {
    /// The section was read and classified.
    Expression {
        depex: Arc<[u8]>,
        class: Classification,
    },
    /// The driver has no dependency section.
    Absent,
    /// The section could not be extracted yet.
    ProtocolError,
}

/// A driver discovered in a firmware volume.
///
/// Entries are cheap to clone: the volume and the dependency expression are
/// shared.
#[derive(Clone)]
pub struct DriverEntry {
    id: DriverId,
    volume: VolumeHandle,
    fv: Arc<dyn FirmwareVolume>,
    file_name: EfiGuid,
    file_type: FvFileType,
    state: DriverState,
    depex: Option<Arc<[u8]>>,
    order: Option<DispatchOrder>,
    depex_protocol_error: bool,
    image: Option<ImageHandle>,
}

impl DriverEntry {
    pub(crate) fn new(
        volume: VolumeHandle,
        fv: Arc<dyn FirmwareVolume>,
        file_name: EfiGuid,
        file_type: FvFileType,
    ) -> Self {
        Self {
            id: DriverId::new(0),
            volume,
            fv,
            file_name,
            file_type,
            state: DriverState::Dependent,
            depex: None,
            order: None,
            depex_protocol_error: false,
            image: None,
        }
    }

    /// Registry index of this driver.
    pub fn id(&self) -> DriverId {
        self.id
    }

    /// Volume the driver was found in.
    pub fn volume(&self) -> VolumeHandle {
        self.volume
    }

    /// Access to the volume the driver was found in.
    pub fn fv(&self) -> &Arc<dyn FirmwareVolume> {
        &self.fv
    }

    /// File name GUID.
    pub fn file_name(&self) -> EfiGuid {
        self.file_name
    }

    /// File type.
    pub fn file_type(&self) -> FvFileType {
        self.file_type
    }

    /// Current dispatch state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Raw dependency expression, if the driver has one.
    pub fn depex(&self) -> Option<&[u8]> {
        self.depex.as_deref()
    }

    /// Before/after placement, if the expression requested one.
    pub fn order(&self) -> Option<DispatchOrder> {
        self.order
    }

    /// `true` while the dependency section could not be extracted.
    pub fn has_depex_protocol_error(&self) -> bool {
        self.depex_protocol_error
    }

    /// Image handle, once loaded.
    pub fn image(&self) -> Option<ImageHandle> {
        self.image
    }

    /// `true` for nested firmware volume images gated by a dependency expression.
    pub fn is_fv_image(&self) -> bool {
        self.file_type == FvFileType::FIRMWARE_VOLUME_IMAGE
    }

    pub(crate) fn set_id(&mut self, id: DriverId) {
        self.id = id;
    }

    pub(crate) fn set_state(&mut self, state: DriverState) {
        self.state = state;
    }

    pub(crate) fn set_image(&mut self, image: Option<ImageHandle>) {
        self.image = image;
    }

    /// Records the outcome of a dependency section read.
    ///
    /// The state only moves for drivers still waiting on their expression; a
    /// driver forced into the queue by an Apriori list keeps its place.
    pub(crate) fn apply_dependency(&mut self, read: DependencyRead) {
        match read {
            DependencyRead::Expression { depex, class } => {
                self.depex = Some(depex);
                self.depex_protocol_error = false;
                let (state, order) = match class {
                    Classification::Unrequested => (DriverState::Unrequested, None),
                    Classification::Dependent(order) => (DriverState::Dependent, order),
                };
                self.order = order;
                if self.state == DriverState::Dependent {
                    self.state = state;
                }
            }
            DependencyRead::Absent => {
                self.depex = None;
                self.order = None;
                self.depex_protocol_error = false;
            }
            DependencyRead::ProtocolError => self.depex_protocol_error = true,
        }
    }
}

impl fmt::Debug for DriverEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverEntry")
            .field("id", &self.id)
            .field("volume", &self.volume)
            .field("file_name", &self.file_name)
            .field("file_type", &self.file_type)
            .field("state", &self.state)
            .field("order", &self.order)
            .field("depex_protocol_error", &self.depex_protocol_error)
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

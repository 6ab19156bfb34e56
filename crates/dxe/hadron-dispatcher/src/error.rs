//! Dispatcher error types.
//!
//! Only misuse of the dispatcher surfaces as an error. Problems with a single
//! driver (unreadable dependency section, failed load, rejected image) are
//! recorded as state transitions on that driver instead.

use thiserror::Error;
use uefi::{EfiGuid, EfiStatus};

use crate::handle::{ImageHandle, VolumeHandle};

/// Errors returned by dispatcher entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// [`Dispatcher::dispatch`](crate::Dispatcher::dispatch) was called while already running.
    #[error("dispatcher is already running")]
    AlreadyRunning,
    /// No driver with the requested name and state exists in the volume.
    #[error("no matching driver {file} in {volume}")]
    NotFound {
        /// Volume that was searched.
        volume: VolumeHandle,
        /// File name that was requested.
        file: EfiGuid,
    },
    /// The driver was already registered from this volume.
    #[error("driver {file} from {volume} is already registered")]
    AlreadyStarted {
        /// Volume the driver lives in.
        volume: VolumeHandle,
        /// File name of the driver.
        file: EfiGuid,
    },
}

impl DispatchError {
    /// Returns the UEFI status code reported for this error.
    pub const fn status(&self) -> EfiStatus {
        match self {
            Self::AlreadyRunning | Self::AlreadyStarted { .. } => EfiStatus::ALREADY_STARTED,
            Self::NotFound { .. } => EfiStatus::NOT_FOUND,
        }
    }
}

/// Reasons an [`ImageLoader`](crate::ImageLoader) could not produce a runnable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The security policy refused the image.
    ///
    /// The loader may still hand back the image it loaded, in which case a
    /// later [`Dispatcher::trust`](crate::Dispatcher::trust) starts it without loading again.
    #[error("image rejected by security policy")]
    SecurityViolation(Option<ImageHandle>),
    /// The image could not be loaded.
    #[error("image load failed: {0}")]
    Failed(EfiStatus),
}

impl LoadError {
    /// Returns the UEFI status code reported for this error.
    pub const fn status(&self) -> EfiStatus {
        match self {
            Self::SecurityViolation(_) => EfiStatus::SECURITY_VIOLATION,
            Self::Failed(status) => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_all_variants() {
        let file = EfiGuid::new(1, 2, 3, [4; 8]);
        let volume = VolumeHandle::new(2);
        assert_eq!(
            DispatchError::AlreadyRunning.to_string(),
            "dispatcher is already running"
        );
        assert_eq!(
            DispatchError::NotFound { volume, file }.to_string(),
            "no matching driver 00000001-0002-0003-0404-040404040404 in fv2"
        );
        assert_eq!(
            LoadError::Failed(EfiStatus::LOAD_ERROR).to_string(),
            "image load failed: EFI_LOAD_ERROR"
        );
    }

    #[test]
    fn status_mapping() {
        let file = EfiGuid::ZERO;
        let volume = VolumeHandle::new(0);
        assert_eq!(
            DispatchError::AlreadyRunning.status(),
            EfiStatus::ALREADY_STARTED
        );
        assert_eq!(
            DispatchError::NotFound { volume, file }.status(),
            EfiStatus::NOT_FOUND
        );
        assert_eq!(
            LoadError::SecurityViolation(None).status(),
            EfiStatus::SECURITY_VIOLATION
        );
        assert_eq!(
            LoadError::Failed(EfiStatus::OUT_OF_RESOURCES).status(),
            EfiStatus::OUT_OF_RESOURCES
        );
    }
}

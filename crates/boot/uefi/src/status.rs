//! UEFI Status codes.
//!
//! This module defines the [`EfiStatus`] type, a newtype wrapper around `usize` that represents
//! UEFI status codes. Only the codes that firmware volume, image, and security services report
//! to the dispatcher (or that the dispatcher reports back) are named here; any other value still
//! round-trips and prints as an unknown error or warning.
//!
//! The high bit of the status code distinguishes errors from warnings/success.

use core::fmt;

/// The high bit of `usize`, used to distinguish error codes from warnings.
const ERROR_BIT: usize = 1 << (usize::BITS - 1);

/// A UEFI status code.
///
/// This is a transparent wrapper around `usize`, matching the UEFI `EFI_STATUS` type.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EfiStatus(pub usize);

impl EfiStatus {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0);

    // ── Error codes ──────────────────────────────────────────────────

    /// The image failed to load.
    pub const LOAD_ERROR: Self = Self(ERROR_BIT | 1);
    /// A parameter was incorrect.
    pub const INVALID_PARAMETER: Self = Self(ERROR_BIT | 2);
    /// The operation is not supported.
    pub const UNSUPPORTED: Self = Self(ERROR_BIT | 3);
    /// There is no data pending upon return.
    pub const NOT_READY: Self = Self(ERROR_BIT | 6);
    /// The physical device reported an error while attempting the operation.
    pub const DEVICE_ERROR: Self = Self(ERROR_BIT | 7);
    /// A resource has run out.
    pub const OUT_OF_RESOURCES: Self = Self(ERROR_BIT | 9);
    /// The firmware volume or section is malformed.
    pub const VOLUME_CORRUPTED: Self = Self(ERROR_BIT | 0x0a);
    /// The item was not found.
    pub const NOT_FOUND: Self = Self(ERROR_BIT | 0x0e);
    /// Access was denied.
    pub const ACCESS_DENIED: Self = Self(ERROR_BIT | 0x0f);
    /// The image has not been started.
    pub const NOT_STARTED: Self = Self(ERROR_BIT | 0x13);
    /// The service has already been started.
    pub const ALREADY_STARTED: Self = Self(ERROR_BIT | 0x14);
    /// The operation was aborted.
    pub const ABORTED: Self = Self(ERROR_BIT | 0x15);
    /// Section extraction is not available yet; the read may be retried later.
    pub const PROTOCOL_ERROR: Self = Self(ERROR_BIT | 0x18);
    /// The function was not performed due to a security violation.
    pub const SECURITY_VIOLATION: Self = Self(ERROR_BIT | 0x1a);

    /// Returns `true` if this status code indicates success.
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this status code indicates an error (high bit set).
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 & ERROR_BIT != 0
    }

    /// Returns `true` if this status code indicates a warning (non-zero, high bit clear).
    #[inline]
    #[must_use]
    pub const fn is_warning(self) -> bool {
        !self.is_success() && !self.is_error()
    }

    /// Converts this status code to a `Result`.
    ///
    /// # Errors
    ///
    /// Returns `Err(EfiStatus)` if the status code indicates an error (high bit set).
    #[inline]
    pub const fn to_result(self) -> Result<(), Self> {
        if self.is_error() { Err(self) } else { Ok(()) }
    }

    /// Returns a human-readable name for the status code, if known.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::SUCCESS => Some("EFI_SUCCESS"),
            Self::LOAD_ERROR => Some("EFI_LOAD_ERROR"),
            Self::INVALID_PARAMETER => Some("EFI_INVALID_PARAMETER"),
            Self::UNSUPPORTED => Some("EFI_UNSUPPORTED"),
            Self::NOT_READY => Some("EFI_NOT_READY"),
            Self::DEVICE_ERROR => Some("EFI_DEVICE_ERROR"),
            Self::OUT_OF_RESOURCES => Some("EFI_OUT_OF_RESOURCES"),
            Self::VOLUME_CORRUPTED => Some("EFI_VOLUME_CORRUPTED"),
            Self::NOT_FOUND => Some("EFI_NOT_FOUND"),
            Self::ACCESS_DENIED => Some("EFI_ACCESS_DENIED"),
            Self::NOT_STARTED => Some("EFI_NOT_STARTED"),
            Self::ALREADY_STARTED => Some("EFI_ALREADY_STARTED"),
            Self::ABORTED => Some("EFI_ABORTED"),
            Self::PROTOCOL_ERROR => Some("EFI_PROTOCOL_ERROR"),
            Self::SECURITY_VIOLATION => Some("EFI_SECURITY_VIOLATION"),
            _ => None,
        }
    }
}

impl fmt::Debug for EfiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "EfiStatus({name})"),
            None => write!(f, "EfiStatus({:#x})", self.0),
        }
    }
}

impl fmt::Display for EfiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None if self.is_error() => {
                write!(f, "Unknown error ({:#x})", self.0 & !ERROR_BIT)
            }
            None => write!(f, "Unknown warning ({})", self.0),
        }
    }
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<EfiStatus>() == 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(EfiStatus::SUCCESS.is_success());
        assert!(EfiStatus::PROTOCOL_ERROR.is_error());
        assert!(EfiStatus(4).is_warning());
        assert_eq!(EfiStatus::SUCCESS.to_result(), Ok(()));
        assert_eq!(
            EfiStatus::NOT_FOUND.to_result(),
            Err(EfiStatus::NOT_FOUND)
        );
    }

    #[test]
    fn display_known_and_unknown() {
        assert_eq!(
            EfiStatus::SECURITY_VIOLATION.to_string(),
            "EFI_SECURITY_VIOLATION"
        );
        assert_eq!(
            EfiStatus(ERROR_BIT | 0x40).to_string(),
            "Unknown error (0x40)"
        );
        assert_eq!(EfiStatus(3).to_string(), "Unknown warning (3)");
    }
}

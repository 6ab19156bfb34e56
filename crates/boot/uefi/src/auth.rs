//! Section authentication status.
//!
//! Firmware volume services report, for every section they return, how the
//! section's containing files were authenticated. The security policy decides
//! from these bits whether the data may be used.

use bitflags::bitflags;

bitflags! {
    /// Authentication status attached to a section read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AuthStatus: u32 {
        /// Platform-specific override of the other bits.
        const PLATFORM_OVERRIDE = 0x01;
        /// An encapsulating section carried a signature.
        const IMAGE_SIGNED = 0x02;
        /// The signature was not tested.
        const NOT_TESTED = 0x04;
        /// The signature was tested and failed.
        const TEST_FAILED = 0x08;
    }
}

impl AuthStatus {
    /// Returns `true` if a signature was present and verified.
    #[must_use]
    pub const fn is_verified(self) -> bool {
        self.contains(Self::IMAGE_SIGNED)
            && !self.intersects(Self::NOT_TESTED.union(Self::TEST_FAILED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_requires_signed_and_tested() {
        assert!(AuthStatus::IMAGE_SIGNED.is_verified());
        assert!(!AuthStatus::empty().is_verified());
        assert!(!(AuthStatus::IMAGE_SIGNED | AuthStatus::TEST_FAILED).is_verified());
        assert!(!(AuthStatus::IMAGE_SIGNED | AuthStatus::NOT_TESTED).is_verified());
    }
}

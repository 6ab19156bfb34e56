//! Firmware file system (FFS) constants.
//!
//! File types select which directory entries of a firmware volume the
//! dispatcher looks at, section types select what it reads out of a file, and
//! the [`depex`] opcodes describe the dependency-expression byte-code attached
//! to DXE drivers.

use core::fmt;

/// Type of a file stored in a firmware volume.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FvFileType(pub u8);

impl FvFileType {
    /// Wildcard used when enumerating every file.
    pub const ALL: Self = Self(0x00);
    /// Raw binary file.
    pub const RAW: Self = Self(0x01);
    /// Sectioned file with no fixed meaning.
    pub const FREEFORM: Self = Self(0x02);
    /// Security (SEC) core.
    pub const SECURITY_CORE: Self = Self(0x03);
    /// PEI foundation.
    pub const PEI_CORE: Self = Self(0x04);
    /// DXE foundation; the image hosting the dispatcher itself.
    pub const DXE_CORE: Self = Self(0x05);
    /// PEI module.
    pub const PEIM: Self = Self(0x06);
    /// DXE driver.
    pub const DRIVER: Self = Self(0x07);
    /// Module runnable as a PEIM or a DXE driver.
    pub const COMBINED_PEIM_DRIVER: Self = Self(0x08);
    /// UEFI application.
    pub const APPLICATION: Self = Self(0x09);
    /// Management-mode driver.
    pub const MM: Self = Self(0x0a);
    /// Encapsulated firmware volume.
    pub const FIRMWARE_VOLUME_IMAGE: Self = Self(0x0b);
    /// Module runnable as an MM driver or a DXE driver.
    pub const COMBINED_MM_DXE: Self = Self(0x0c);
    /// Management-mode foundation.
    pub const MM_CORE: Self = Self(0x0d);

    /// File types a DXE dispatcher walks, in discovery order.
    pub const DXE_DISPATCH_ORDER: [Self; 5] = [
        Self::DRIVER,
        Self::COMBINED_MM_DXE,
        Self::COMBINED_PEIM_DRIVER,
        Self::DXE_CORE,
        Self::FIRMWARE_VOLUME_IMAGE,
    ];

    /// Returns a human-readable name for the file type, if known.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::ALL => Some("ALL"),
            Self::RAW => Some("RAW"),
            Self::FREEFORM => Some("FREEFORM"),
            Self::SECURITY_CORE => Some("SECURITY_CORE"),
            Self::PEI_CORE => Some("PEI_CORE"),
            Self::DXE_CORE => Some("DXE_CORE"),
            Self::PEIM => Some("PEIM"),
            Self::DRIVER => Some("DRIVER"),
            Self::COMBINED_PEIM_DRIVER => Some("COMBINED_PEIM_DRIVER"),
            Self::APPLICATION => Some("APPLICATION"),
            Self::MM => Some("MM"),
            Self::FIRMWARE_VOLUME_IMAGE => Some("FIRMWARE_VOLUME_IMAGE"),
            Self::COMBINED_MM_DXE => Some("COMBINED_MM_DXE"),
            Self::MM_CORE => Some("MM_CORE"),
            _ => None,
        }
    }
}

impl fmt::Debug for FvFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "FvFileType({name})"),
            None => write!(f, "FvFileType({:#04x})", self.0),
        }
    }
}

/// Type of a section inside a firmware file.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionType(pub u8);

impl SectionType {
    /// Compressed encapsulation section.
    pub const COMPRESSION: Self = Self(0x01);
    /// GUID-defined encapsulation section.
    pub const GUID_DEFINED: Self = Self(0x02);
    /// PE32+ executable image.
    pub const PE32: Self = Self(0x10);
    /// Terse executable image.
    pub const TE: Self = Self(0x12);
    /// DXE dependency expression.
    pub const DXE_DEPEX: Self = Self(0x13);
    /// Version string.
    pub const VERSION: Self = Self(0x14);
    /// User interface name.
    pub const USER_INTERFACE: Self = Self(0x15);
    /// Encapsulated firmware volume image.
    pub const FIRMWARE_VOLUME_IMAGE: Self = Self(0x17);
    /// Raw data.
    pub const RAW: Self = Self(0x19);
    /// PEI dependency expression.
    pub const PEI_DEPEX: Self = Self(0x1b);
    /// MM dependency expression.
    pub const MM_DEPEX: Self = Self(0x1c);
}

/// Dependency expression opcodes.
pub mod depex {
    /// The driver runs before the file named by the following GUID.
    pub const BEFORE: u8 = 0x00;
    /// The driver runs after the file named by the following GUID.
    pub const AFTER: u8 = 0x01;
    /// Push the presence of the protocol named by the following GUID.
    pub const PUSH: u8 = 0x02;
    /// Logical AND of the two top stack entries.
    pub const AND: u8 = 0x03;
    /// Logical OR of the two top stack entries.
    pub const OR: u8 = 0x04;
    /// Logical NOT of the top stack entry.
    pub const NOT: u8 = 0x05;
    /// Push `true`.
    pub const TRUE: u8 = 0x06;
    /// Push `false`.
    pub const FALSE: u8 = 0x07;
    /// End of expression; the top stack entry is the result.
    pub const END: u8 = 0x08;
    /// Schedule on request: the driver waits for an explicit schedule call.
    pub const SOR: u8 = 0x09;
}

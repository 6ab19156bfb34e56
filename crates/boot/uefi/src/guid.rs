//! Globally Unique Identifier (GUID) type and the PI constants used by the dispatcher.
//!
//! Firmware files are content-addressed by GUID, firmware volumes carry a GUID
//! name in their extended header, and Apriori files are flat arrays of GUIDs.
//! [`EfiGuid`] covers all three uses, including decoding from the on-flash
//! little-endian byte layout.

use core::fmt;

/// Size of a GUID in its binary (on-flash) form.
pub const GUID_SIZE: usize = 16;

/// A UEFI Globally Unique Identifier (GUID).
///
/// GUIDs are 128-bit identifiers formatted as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EfiGuid {
    /// The first 32 bits of the GUID.
    pub data1: u32,
    /// The next 16 bits of the GUID.
    pub data2: u16,
    /// The next 16 bits of the GUID.
    pub data3: u16,
    /// The remaining 64 bits of the GUID.
    pub data4: [u8; 8],
}

#[expect(
    clippy::unreadable_literal,
    reason = "GUID bytes are inherently opaque"
)]
impl EfiGuid {
    /// The all-zero GUID.
    pub const ZERO: Self = Self::new(0, 0, 0, [0; 8]);

    /// Creates a new GUID from its component parts.
    #[must_use]
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Decodes a GUID from its binary layout (little-endian `data1..data3`).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; GUID_SIZE]) -> Self {
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4: [
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ],
        }
    }

    /// Decodes a GUID from the first [`GUID_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if the slice is too short.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; GUID_SIZE] = bytes.get(..GUID_SIZE)?.try_into().ok()?;
        Some(Self::from_bytes(raw))
    }

    /// Encodes this GUID into its binary layout.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; GUID_SIZE] {
        let d1 = self.data1.to_le_bytes();
        let d2 = self.data2.to_le_bytes();
        let d3 = self.data3.to_le_bytes();
        [
            d1[0],
            d1[1],
            d1[2],
            d1[3],
            d2[0],
            d2[1],
            d3[0],
            d3[1],
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        ]
    }

    // ── Protocol GUIDs ───────────────────────────────────────────────

    /// Firmware Volume 2 Protocol GUID.
    pub const FIRMWARE_VOLUME2_PROTOCOL: Self = Self::new(
        0x220e73b6,
        0x6bdb,
        0x4413,
        [0x84, 0x05, 0xb9, 0x74, 0xb1, 0x08, 0x61, 0x9a],
    );

    /// Firmware Volume Block 2 Protocol GUID.
    pub const FIRMWARE_VOLUME_BLOCK2_PROTOCOL: Self = Self::new(
        0x8f644fa9,
        0xe850,
        0x4db1,
        [0x9c, 0xe2, 0x0b, 0x44, 0x69, 0x8e, 0x8d, 0xa4],
    );

    /// Security Architectural Protocol GUID.
    pub const SECURITY_ARCH_PROTOCOL: Self = Self::new(
        0xa46423e3,
        0x4617,
        0x49f1,
        [0xb9, 0xff, 0xd1, 0xbf, 0xa9, 0x11, 0x58, 0x39],
    );

    // ── File name GUIDs ──────────────────────────────────────────────

    /// Name of the DXE Apriori file.
    pub const APRIORI_FILE: Self = Self::new(
        0xfc510ee7,
        0xffdc,
        0x11d4,
        [0xbd, 0x41, 0x00, 0x80, 0xc7, 0x3c, 0x88, 0x81],
    );

    // ── Event group GUIDs ────────────────────────────────────────────

    /// Event group signaled after each dispatch round.
    pub const EVENT_DXE_DISPATCH: Self = Self::new(
        0x7081e22f,
        0xcac6,
        0x4053,
        [0x94, 0x68, 0x67, 0x57, 0x82, 0xcf, 0x88, 0xe5],
    );
}

impl fmt::Debug for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EfiGuid({self})")
    }
}

impl fmt::Display for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

// ── Compile-time layout assertions ──────────────────────────────────

const _: () = assert!(core::mem::size_of::<EfiGuid>() == GUID_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_registry_format() {
        assert_eq!(
            EfiGuid::APRIORI_FILE.to_string(),
            "fc510ee7-ffdc-11d4-bd41-0080c73c8881"
        );
    }

    #[test]
    fn decodes_little_endian_layout() {
        let bytes = [
            0xe7, 0x0e, 0x51, 0xfc, 0xdc, 0xff, 0xd4, 0x11, 0xbd, 0x41, 0x00, 0x80, 0xc7, 0x3c,
            0x88, 0x81,
        ];
        assert_eq!(EfiGuid::from_bytes(bytes), EfiGuid::APRIORI_FILE);
        assert_eq!(EfiGuid::APRIORI_FILE.to_bytes(), bytes);
    }

    #[test]
    fn from_slice_rejects_short_input() {
        assert!(EfiGuid::from_slice(&[0u8; 15]).is_none());
        let mut long = EfiGuid::FIRMWARE_VOLUME2_PROTOCOL.to_bytes().to_vec();
        long.extend_from_slice(&[0xaa, 0xbb]);
        assert_eq!(
            EfiGuid::from_slice(&long),
            Some(EfiGuid::FIRMWARE_VOLUME2_PROTOCOL)
        );
    }
}

//! Dispatcher configuration.
//!
//! Supplied by the platform when the dispatcher is created. The defaults
//! match a standard PI DXE phase.

use alloc::vec::Vec;

use uefi::EfiGuid;
use uefi::ffs::FvFileType;

/// Marker left by an earlier boot stage for a nested volume it already extracted.
///
/// The file named `file_name` inside the volume named `volume_name` has been
/// published as a volume of its own, so the dispatcher must not expand it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedImage {
    /// Name GUID of the parent firmware volume.
    pub volume_name: EfiGuid,
    /// File name of the volume image inside the parent.
    pub file_name: EfiGuid,
}

/// Runtime configuration of a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// File types walked when a volume arrives, in order.
    pub file_types: Vec<FvFileType>,
    /// Name of the file whose RAW section holds the Apriori list.
    pub apriori_file: EfiGuid,
    /// Nested volumes already extracted by an earlier boot stage.
    pub extracted_images: Vec<ExtractedImage>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            file_types: FvFileType::DXE_DISPATCH_ORDER.to_vec(),
            apriori_file: EfiGuid::APRIORI_FILE,
            extracted_images: Vec::new(),
        }
    }
}

impl DispatcherConfig {
    /// Replaces the file types walked on volume arrival.
    #[must_use]
    pub fn with_file_types(mut self, file_types: &[FvFileType]) -> Self {
        self.file_types = file_types.to_vec();
        self
    }

    /// Replaces the Apriori file name.
    #[must_use]
    pub fn with_apriori_file(mut self, name: EfiGuid) -> Self {
        self.apriori_file = name;
        self
    }

    /// Records a nested volume already extracted by an earlier boot stage.
    #[must_use]
    pub fn with_extracted_image(mut self, volume_name: EfiGuid, file_name: EfiGuid) -> Self {
        self.extracted_images.push(ExtractedImage {
            volume_name,
            file_name,
        });
        self
    }

    /// Returns `true` if `file_name` in the volume named `volume_name` was already extracted.
    #[must_use]
    pub fn is_extracted(&self, volume_name: &EfiGuid, file_name: &EfiGuid) -> bool {
        self.extracted_images
            .iter()
            .any(|marker| marker.volume_name == *volume_name && marker.file_name == *file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_dxe_order() {
        let config = DispatcherConfig::default();
        assert_eq!(config.file_types, FvFileType::DXE_DISPATCH_ORDER);
        assert_eq!(config.apriori_file, EfiGuid::APRIORI_FILE);
        assert!(config.extracted_images.is_empty());
    }

    #[test]
    fn builders_replace_discovery_settings() {
        let apriori = EfiGuid::new(3, 0, 0, [0; 8]);
        let config = DispatcherConfig::default()
            .with_file_types(&[FvFileType::DRIVER])
            .with_apriori_file(apriori);
        assert_eq!(config.file_types, [FvFileType::DRIVER]);
        assert_eq!(config.apriori_file, apriori);
        assert!(config.extracted_images.is_empty());

        let none = DispatcherConfig::default().with_file_types(&[]);
        assert!(none.file_types.is_empty());
    }

    #[test]
    fn extracted_marker_matches_both_names() {
        let parent = EfiGuid::new(1, 0, 0, [0; 8]);
        let file = EfiGuid::new(2, 0, 0, [0; 8]);
        let config = DispatcherConfig::default().with_extracted_image(parent, file);
        assert!(config.is_extracted(&parent, &file));
        assert!(!config.is_extracted(&file, &parent));
    }
}

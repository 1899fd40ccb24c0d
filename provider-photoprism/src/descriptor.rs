//! Album descriptor parsing.
//!
//! PhotoPrism exports each album as a YAML file. Only the photo list matters:
//!
//! ```yaml
//! UID: aqmxlr71p6zo22dk
//! Title: Photostream
//! Photos:
//!   - UID: pqmxlquf9tbc8mk2
//!   - UID: pqmxlr3f3b8kmyzy
//!     Hidden: true
//! ```

use crate::error::{PhotoPrismError, Result};
use bridge_traits::AssetId;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AlbumDescriptor {
    #[serde(rename = "Photos", default)]
    photos: Option<Vec<DescriptorPhoto>>,
}

#[derive(Debug, Deserialize)]
struct DescriptorPhoto {
    #[serde(rename = "UID")]
    uid: String,
    #[serde(rename = "Hidden", default)]
    hidden: bool,
}

/// Visible photo UIDs listed in a descriptor.
///
/// A missing or empty `Photos` key is an empty album. An empty or null
/// document is an error, as PhotoPrism truncates the file before rewriting
/// it. Malformed YAML, an entry without `UID` or an unusable UID is an error
/// as well.
pub fn parse_descriptor(path: &Path, yaml: &str) -> Result<HashSet<AssetId>> {
    let invalid = |message: String| PhotoPrismError::Descriptor {
        path: path.to_path_buf(),
        message,
    };

    if yaml.trim().is_empty() {
        return Err(invalid("descriptor is empty".to_string()));
    }

    let descriptor: Option<AlbumDescriptor> =
        serde_yaml::from_str(yaml).map_err(|e| invalid(e.to_string()))?;
    let descriptor = descriptor.ok_or_else(|| invalid("descriptor is null".to_string()))?;

    descriptor
        .photos
        .unwrap_or_default()
        .into_iter()
        .filter(|photo| !photo.hidden)
        .map(|photo| AssetId::parse(photo.uid).map_err(|e| invalid(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<HashSet<AssetId>> {
        parse_descriptor(Path::new("album.yml"), yaml)
    }

    fn ids(raw: &[&str]) -> HashSet<AssetId> {
        raw.iter().map(|id| AssetId::parse(*id).unwrap()).collect()
    }

    #[test]
    fn test_hidden_photos_are_excluded() {
        let yaml = r#"
UID: aq1
Title: Photostream
Photos:
  - UID: pq1
  - UID: pq2
    Hidden: true
  - UID: pq3
    Hidden: false
"#;
        assert_eq!(parse(yaml).unwrap(), ids(&["pq1", "pq3"]));
    }

    #[test]
    fn test_missing_or_empty_photos_is_empty_album() {
        assert!(parse("UID: aq1\nTitle: Empty\n").unwrap().is_empty());
        assert!(parse("Photos:\n").unwrap().is_empty());
        assert!(parse("Photos: []\n").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_descriptor_is_an_error() {
        for yaml in ["", "  \n", "~\n", "null\n"] {
            assert!(
                matches!(parse(yaml), Err(PhotoPrismError::Descriptor { .. })),
                "{yaml:?} parsed as an album"
            );
        }
    }

    #[test]
    fn test_duplicate_uids_collapse() {
        let yaml = "Photos:\n  - UID: pq1\n  - UID: pq1\n";
        assert_eq!(parse(yaml).unwrap(), ids(&["pq1"]));
    }

    #[test]
    fn test_entry_without_uid_is_an_error() {
        let yaml = "Photos:\n  - Hidden: false\n";
        assert!(matches!(parse(yaml), Err(PhotoPrismError::Descriptor { .. })));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(matches!(
            parse("Photos: [unclosed\n"),
            Err(PhotoPrismError::Descriptor { .. })
        ));
    }

    #[test]
    fn test_unsafe_uid_is_an_error() {
        let yaml = "Photos:\n  - UID: ../escape\n";
        assert!(matches!(parse(yaml), Err(PhotoPrismError::Descriptor { .. })));
    }
}

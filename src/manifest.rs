// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose reference manifest.
//!
//! A manifest is an ordered list of pose entries, each naming a reference
//! photograph. The name is the entry's identity and becomes the stem of the
//! skeleton file written for it.
//!
//! Two JSON layouts are accepted:
//!
//! ```json
//! { "poses": [ { "name": "front-standing", "source": "/photos/front.jpg" } ] }
//! ```
//!
//! ```json
//! { "poses": { "front-standing": "/photos/front.jpg" } }
//! ```
//!
//! Entry order is preserved in both. Relative source paths are resolved
//! against the directory containing the manifest.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SkeletonError};

/// A single pose reference: a name and the photograph it is extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoseEntry {
    /// Pose name, used as the output file stem.
    pub name: String,
    /// Source photograph.
    pub source: PathBuf,
}

impl PoseEntry {
    /// Create a new entry.
    pub fn new<N: Into<String>, P: Into<PathBuf>>(name: N, source: P) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Deterministic output path: `<output_dir>/<name>.png`.
    #[must_use]
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.png", self.name))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoseList {
    Entries(Vec<PoseEntry>),
    Map(serde_json::Map<String, serde_json::Value>),
}

#[derive(Deserialize)]
struct ManifestFile {
    poses: PoseList,
}

/// Ordered, validated collection of pose entries.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<PoseEntry>,
}

impl Manifest {
    /// Build a manifest from entries, validating their names.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::ManifestError`] if a name is empty, duplicated,
    /// or cannot be used as a file stem.
    pub fn new(entries: Vec<PoseEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            validate_name(&entry.name)?;
            if !seen.insert(entry.name.as_str()) {
                return Err(SkeletonError::ManifestError(format!(
                    "duplicate pose name '{}'",
                    entry.name
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Load a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid manifest.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SkeletonError::ManifestError(format!("Failed to read {}: {e}", path.display()))
        })?;

        let mut manifest = Self::from_json_str(&text)?;

        if let Some(base) = path.parent() {
            for entry in &mut manifest.entries {
                if entry.source.is_relative() {
                    entry.source = base.join(&entry.source);
                }
            }
        }

        Ok(manifest)
    }

    /// Parse a manifest from a JSON string. Relative paths are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a name is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ManifestFile = serde_json::from_str(json)?;

        let entries = match file.poses {
            PoseList::Entries(entries) => entries,
            PoseList::Map(map) => map
                .into_iter()
                .map(|(name, value)| match value {
                    serde_json::Value::String(source) => Ok(PoseEntry::new(name, source)),
                    other => Err(SkeletonError::ManifestError(format!(
                        "pose '{name}' must map to a path string, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
        };

        Self::new(entries)
    }

    /// Entries in manifest order.
    #[must_use]
    pub fn entries(&self) -> &[PoseEntry] {
        &self.entries
    }

    /// Iterate entries in manifest order.
    pub fn iter(&self) -> std::slice::Iter<'_, PoseEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a PoseEntry;
    type IntoIter = std::slice::Iter<'a, PoseEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SkeletonError::ManifestError(
            "pose name must not be empty".to_string(),
        ));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) || name.contains('\0') {
        return Err(SkeletonError::ManifestError(format!(
            "pose name '{name}' cannot be used as a file name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry_list_keeps_order() {
        let json = r#"{"poses": [
            {"name": "side-quarter", "source": "/a.jpg"},
            {"name": "back-view", "source": "/b.jpg"},
            {"name": "front-standing", "source": "/c.jpg"}
        ]}"#;
        let manifest = Manifest::from_json_str(json).unwrap();
        let names: Vec<&str> = manifest.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["side-quarter", "back-view", "front-standing"]);
        assert_eq!(manifest.entries()[1].source, PathBuf::from("/b.jpg"));
    }

    #[test]
    fn test_parse_map_keeps_order() {
        let json = r#"{"poses": {"styled": "/s.jpg", "fullbody": "/f.jpg"}}"#;
        let manifest = Manifest::from_json_str(json).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[0].name, "styled");
        assert_eq!(manifest.entries()[1].name, "fullbody");
    }

    #[test]
    fn test_map_with_non_string_value() {
        let json = r#"{"poses": {"styled": 3}}"#;
        let err = Manifest::from_json_str(json).unwrap_err();
        assert!(matches!(err, SkeletonError::ManifestError(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let entries = vec![PoseEntry::new("a", "/1.jpg"), PoseEntry::new("a", "/2.jpg")];
        let err = Manifest::new(entries).unwrap_err();
        assert!(err.to_string().contains("duplicate pose name 'a'"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "  ", "..", "nested/name", "back\\slash"] {
            assert!(
                Manifest::new(vec![PoseEntry::new(name, "/x.jpg")]).is_err(),
                "name {name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_output_path() {
        let entry = PoseEntry::new("side-profile", "/photos/IMG_3450.jpg");
        assert_eq!(
            entry.output_path(Path::new("public/pose-skeletons")),
            PathBuf::from("public/pose-skeletons/side-profile.png")
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(Manifest::from_json_str("{\"poses\": ").is_err());
        assert!(Manifest::from_json_str("{\"entries\": []}").is_err());
    }
}

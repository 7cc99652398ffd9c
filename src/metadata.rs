// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX model metadata parsing.
//!
//! Ultralytics exports store their configuration as YAML-like custom metadata
//! on the ONNX model. The pose backend reads the task, the input size and the
//! keypoint shape from it.

use std::collections::HashMap;

use crate::error::{Result, SkeletonError};

/// Task name used by Ultralytics pose exports.
pub const POSE_TASK: &str = "pose";

/// Metadata extracted from an Ultralytics YOLO ONNX model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Model description (e.g., "Ultralytics YOLO11n-pose model trained on coco-pose.yaml").
    pub description: String,
    /// Ultralytics version used for export.
    pub version: String,
    /// Task the model was exported for (`detect`, `pose`, ...).
    pub task: String,
    /// Model stride (typically 32 for YOLO).
    pub stride: u32,
    /// Batch size the model was exported with.
    pub batch: usize,
    /// Input image size as (height, width).
    pub imgsz: (usize, usize),
    /// Keypoints per person and values per keypoint, e.g. (17, 3).
    pub kpt_shape: (usize, usize),
    /// Class ID to class name mapping.
    pub names: HashMap<usize, String>,
}

impl ModelMetadata {
    /// Parse metadata from ONNX model custom metadata properties.
    ///
    /// # Errors
    ///
    /// Returns an error if no entry contains the metadata or it is malformed.
    pub fn from_onnx_metadata(metadata_map: &HashMap<String, String>) -> Result<Self> {
        let yaml_str = metadata_map
            .get("metadata")
            .or_else(|| metadata_map.get("model_metadata"))
            .or_else(|| metadata_map.values().find(|v| v.contains("task:")))
            .ok_or_else(|| {
                SkeletonError::ModelLoadError(
                    "No metadata found in ONNX model. Ensure the model was exported with Ultralytics."
                        .to_string(),
                )
            })?;

        Self::from_yaml_str(yaml_str)
    }

    /// Parse metadata from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric field cannot be parsed.
    pub fn from_yaml_str(yaml_str: &str) -> Result<Self> {
        let mut metadata = Self::default();

        for line in yaml_str.lines() {
            // Nested entries (class names) are handled by `parse_names_block`.
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('\'').trim_matches('"');

            match key {
                "description" => metadata.description = value.to_string(),
                "version" => metadata.version = value.to_string(),
                "task" => metadata.task = value.to_lowercase(),
                "stride" => metadata.stride = parse_field(key, value)?,
                "batch" => metadata.batch = parse_field(key, value)?,
                _ => {}
            }
        }

        if let Some(imgsz) = parse_pair(yaml_str, "imgsz") {
            metadata.imgsz = imgsz;
        }
        if let Some(kpt_shape) = parse_pair(yaml_str, "kpt_shape") {
            metadata.kpt_shape = kpt_shape;
        }
        metadata.names = parse_names_block(yaml_str);

        Ok(metadata)
    }

    /// Whether the model was exported for pose estimation.
    #[must_use]
    pub fn is_pose(&self) -> bool {
        self.task == POSE_TASK
    }

    /// Number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len().max(1)
    }
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            version: String::new(),
            task: POSE_TASK.to_string(),
            stride: 32,
            batch: 1,
            imgsz: (640, 640),
            kpt_shape: (17, 3),
            names: HashMap::from([(0, "person".to_string())]),
        }
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SkeletonError::ModelLoadError(format!("Invalid {key} value: {value}")))
}

/// Parse a two-element list field, inline (`key: [a, b]`) or as a YAML block list.
fn parse_pair(yaml_str: &str, key: &str) -> Option<(usize, usize)> {
    let prefix = format!("{key}:");
    let lines: Vec<&str> = yaml_str.lines().collect();
    let start = lines.iter().position(|l| l.trim_start().starts_with(&prefix))?;
    let rest = lines[start].trim_start()[prefix.len()..].trim();

    let values: Vec<usize> = if rest.starts_with('[') {
        rest.trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    } else {
        lines[start + 1..]
            .iter()
            .map(|l| l.trim())
            .take_while(|l| l.starts_with('-'))
            .filter_map(|l| l.trim_start_matches('-').trim().parse().ok())
            .collect()
    };

    match values.as_slice() {
        [a, b, ..] => Some((*a, *b)),
        _ => None,
    }
}

/// Parse the names block, either `names: {0: 'person'}` or an indented YAML map.
fn parse_names_block(yaml_str: &str) -> HashMap<usize, String> {
    let mut names = HashMap::new();

    let Some(start) = yaml_str.find("names:") else {
        return names;
    };
    let after = yaml_str[start + "names:".len()..].trim_start();

    let entries: Vec<&str> = if let Some(dict) = after.strip_prefix('{') {
        dict.split('}').next().unwrap_or("").split(',').collect()
    } else {
        after
            .lines()
            .take_while(|l| l.trim().chars().next().is_some_and(|c| c.is_ascii_digit()))
            .collect()
    };

    for entry in entries {
        if let Some((key, value)) = entry.split_once(':') {
            if let Ok(class_id) = key.trim().parse::<usize>() {
                let name = value.trim().trim_matches('\'').trim_matches('"');
                names.insert(class_id, name.to_string());
            }
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSE_METADATA: &str = r"
description: Ultralytics YOLO11n-pose model trained on coco-pose.yaml
author: Ultralytics
version: 8.3.236
stride: 32
task: pose
batch: 1
imgsz:
- 640
- 640
names:
  0: person
kpt_shape:
- 17
- 3
channels: 3
";

    #[test]
    fn test_parse_pose_metadata() {
        let metadata = ModelMetadata::from_yaml_str(POSE_METADATA).unwrap();

        assert!(metadata.is_pose());
        assert_eq!(metadata.stride, 32);
        assert_eq!(metadata.imgsz, (640, 640));
        assert_eq!(metadata.kpt_shape, (17, 3));
        assert_eq!(metadata.names.get(&0).map(String::as_str), Some("person"));
        assert_eq!(metadata.num_classes(), 1);
    }

    #[test]
    fn test_parse_inline_lists_and_dict_names() {
        let yaml = "task: detect\nimgsz: [480, 640]\nkpt_shape: [21, 2]\nnames: {0: 'person', 1: 'bicycle'}";
        let metadata = ModelMetadata::from_yaml_str(yaml).unwrap();
        assert!(!metadata.is_pose());
        assert_eq!(metadata.imgsz, (480, 640));
        assert_eq!(metadata.kpt_shape, (21, 2));
        assert_eq!(metadata.num_classes(), 2);
        assert_eq!(metadata.names.get(&1).map(String::as_str), Some("bicycle"));
    }

    #[test]
    fn test_invalid_stride() {
        assert!(ModelMetadata::from_yaml_str("stride: wide").is_err());
    }

    #[test]
    fn test_from_onnx_metadata_requires_task() {
        let empty = HashMap::from([("author".to_string(), "someone".to_string())]);
        assert!(ModelMetadata::from_onnx_metadata(&empty).is_err());

        let combined = HashMap::from([(String::new(), "task: pose\nstride: 32".to_string())]);
        assert!(ModelMetadata::from_onnx_metadata(&combined).unwrap().is_pose());
    }
}

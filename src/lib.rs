// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Pose Skeletons
//!
//! Batch extraction of pose skeleton images from reference photographs. Each
//! skeleton is drawn on a black canvas the size of its source photograph and
//! written as `<output_dir>/<name>.png`, ready to be used as pose conditioning
//! input by an image-generation pipeline.
//!
//! Pose inference runs on ONNX Runtime with one of two backends:
//!
//! - **`DWPose`** (primary): a whole-body model with 133 keypoints and `SimCC`
//!   heads. It renders `OpenPose` style skeletons with body, hands and face.
//! - **YOLO pose** (secondary): an Ultralytics pose model with COCO-17
//!   keypoints. It returns landmarks that the driver draws in the Ultralytics
//!   pose palette.
//!
//! If the primary backend cannot be initialized (missing model, failed
//! download, runtime error), the whole batch runs on the secondary instead.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use pose_skeletons::{ExtractConfig, Manifest, extract_with_config};
//!
//! let manifest = Manifest::load("pose-references.json")?;
//! let config = ExtractConfig::new().with_output_dir("public/pose-skeletons");
//! let summary = extract_with_config(&manifest, &config);
//! println!("{summary}");
//! # Ok::<(), pose_skeletons::SkeletonError>(())
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Extract every pose in ./pose-references.json (models download on first run)
//! pose-skeletons extract
//!
//! # Custom manifest and output directory
//! pose-skeletons extract --manifest demos/pose-references.json --output out/
//!
//! # Force the YOLO pose backend
//! pose-skeletons extract --backend yolo --conf 0.4
//! ```
//!
//! ## Manifest Format
//!
//! ```json
//! { "poses": [ { "name": "front-standing", "source": "photos/front.jpg" } ] }
//! ```
//!
//! Relative sources resolve against the manifest's directory. The object form
//! `{ "poses": { "front-standing": "photos/front.jpg" } }` is also accepted.
//!
//! ## Custom Backends
//!
//! Anything implementing [`PoseBackend`] can drive a pass:
//!
//! ```no_run
//! use std::path::Path;
//! use pose_skeletons::{
//!     ChannelOrder, Detection, LandmarkStyle, Manifest, PoseBackend, Result, run_pass,
//! };
//! use pose_skeletons::backend::BackendKind;
//!
//! struct Nobody;
//!
//! impl PoseBackend for Nobody {
//!     fn kind(&self) -> BackendKind {
//!         BackendKind::YoloPose
//!     }
//!     fn input_order(&self) -> ChannelOrder {
//!         ChannelOrder::Rgb
//!     }
//!     fn detect(&mut self, _image: &ndarray::Array3<u8>) -> Result<Detection> {
//!         Ok(Detection::NoPose)
//!     }
//! }
//!
//! let manifest = Manifest::load("pose-references.json")?;
//! let report = run_pass(&mut Nobody, &manifest, Path::new("out"), &LandmarkStyle::default());
//! assert_eq!(report.succeeded(), 0);
//! # Ok::<(), pose_skeletons::SkeletonError>(())
//! ```
//!
//! ## Hardware Acceleration
//!
//! ```bash
//! cargo build --release --features cuda
//! cargo build --release --features tensorrt
//! cargo build --release --features coreml
//! cargo build --release --features openvino
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`driver`] | Extraction loop and backend fallback |
//! | [`backend`] | [`PoseBackend`] trait, `DWPose` and YOLO pose backends |
//! | [`manifest`] | Pose entries and the JSON manifest loader |
//! | [`config`] | [`ExtractConfig`] builder |
//! | [`model`] | [`PoseModel`] YOLO pose session wrapper |
//! | [`preprocessing`] | Letterbox and top-down crop |
//! | [`postprocessing`] | YOLO pose decoding, NMS, `SimCC` decoding |
//! | [`visualizer`] | Skeleton renderers |
//! | [`error`] | Error types ([`SkeletonError`], [`Result`]) |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod backend;
pub mod cli;
pub mod config;
pub mod device;
pub mod download;
pub mod driver;
pub mod error;
pub mod image_io;
pub mod manifest;
pub mod metadata;
pub mod model;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod visualizer;

// Re-export main types for convenience
pub use backend::{
    Detection, DwposeBackend, PoseBackend, SkeletonHandle, SkeletonOutput, YoloPoseBackend,
};
pub use config::{BackendSelection, ExtractConfig};
pub use device::Device;
pub use driver::{
    EntryOutcome, PassReport, RunSummary, SkipReason, extract, extract_with_config, run_pass,
};
pub use error::{InitFailure, Result, SkeletonError};
pub use image_io::ChannelOrder;
pub use manifest::{Manifest, PoseEntry};
pub use metadata::ModelMetadata;
pub use model::PoseModel;
pub use results::{Boxes, Keypoints, Landmark, Landmarks, PersonLandmarks, PoseResults, Speed, WholeBody};
pub use visualizer::LandmarkStyle;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pose-skeletons");
    }
}

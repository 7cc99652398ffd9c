// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{BackendSelection, DEFAULT_MANIFEST, DEFAULT_OUTPUT_DIR};
use crate::device::Device;
use crate::download::{DEFAULT_DWPOSE_MODEL, DEFAULT_POSE_MODEL};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Extract Options:
    --manifest <PATH>       Pose manifest JSON [default: pose-references.json]
    --output, -o <DIR>      Output directory [default: public/pose-skeletons]
    --backend <BACKEND>     auto, dwpose or yolo [default: auto]
    --dwpose-model <PATH>   DWPose whole-body ONNX model
    --pose-model <PATH>     YOLO pose ONNX model
    --conf <CONF>           Person confidence threshold [default: 0.5]
    --iou <IOU>             IoU threshold for NMS [default: 0.45]
    --kpt-threshold <F>     Landmark visibility threshold [default: 0.5]
    --device <DEVICE>       Device (cpu, cuda:0, tensorrt:0, mps, coreml, openvino)
    --no-download           Never download missing models
    --no-person-detector    Run DWPose on the whole image instead of per person
    --verbose <BOOL>        Show verbose output

Examples:
    pose-skeletons extract
    pose-skeletons extract --manifest demos/pose-references.json --output out/
    pose-skeletons extract --backend yolo --conf 0.4
    pose-skeletons extract --dwpose-model models/dw-ll_ucoco_384.onnx --device cuda:0"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract pose skeletons for every entry in a manifest
    Extract(ExtractArgs),
}

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Pose manifest JSON
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Output directory for `<name>.png` skeletons
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Backend selection (auto falls back from dwpose to yolo)
    #[arg(long, default_value_t = BackendSelection::Auto)]
    pub backend: BackendSelection,

    /// DWPose whole-body ONNX model
    #[arg(long, default_value = DEFAULT_DWPOSE_MODEL)]
    pub dwpose_model: PathBuf,

    /// YOLO pose ONNX model
    #[arg(long, default_value = DEFAULT_POSE_MODEL)]
    pub pose_model: PathBuf,

    /// Person confidence threshold
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Landmark visibility threshold
    #[arg(long, default_value_t = 0.5)]
    pub kpt_threshold: f32,

    /// YOLO inference image size
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Device to use (cpu, cuda:0, tensorrt:0, mps, coreml, openvino)
    #[arg(long)]
    pub device: Option<Device>,

    /// Never download missing models
    #[arg(long, default_value_t = false)]
    pub no_download: bool,

    /// Run `DWPose` on the whole image instead of on detected people
    #[arg(long, default_value_t = false)]
    pub no_person_detector: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_args_defaults() {
        let args = Cli::parse_from(["app", "extract"]);
        match args.command {
            Commands::Extract(extract_args) => {
                assert_eq!(extract_args.manifest, PathBuf::from(DEFAULT_MANIFEST));
                assert_eq!(extract_args.output, PathBuf::from(DEFAULT_OUTPUT_DIR));
                assert_eq!(extract_args.backend, BackendSelection::Auto);
                assert!((extract_args.conf - 0.5).abs() < f32::EPSILON);
                assert!((extract_args.iou - 0.45).abs() < f32::EPSILON);
                assert!(!extract_args.no_download);
                assert!(!extract_args.no_person_detector);
                assert!(extract_args.verbose);
                assert!(extract_args.device.is_none());
            }
        }
    }

    #[test]
    fn test_extract_args_custom() {
        let args = Cli::parse_from([
            "app",
            "extract",
            "--manifest",
            "poses.json",
            "-o",
            "out",
            "--backend",
            "yolo",
            "--device",
            "cuda:1",
            "--no-download",
            "--no-person-detector",
            "--verbose",
            "false",
        ]);
        match args.command {
            Commands::Extract(extract_args) => {
                assert_eq!(extract_args.manifest, PathBuf::from("poses.json"));
                assert_eq!(extract_args.output, PathBuf::from("out"));
                assert_eq!(extract_args.backend, BackendSelection::Yolo);
                assert_eq!(extract_args.device, Some(Device::Cuda(1)));
                assert!(extract_args.no_download);
                assert!(extract_args.no_person_detector);
                assert!(!extract_args.verbose);
            }
        }
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let result = Cli::try_parse_from(["app", "extract", "--backend", "openpose"]);
        assert!(result.is_err());
    }
}

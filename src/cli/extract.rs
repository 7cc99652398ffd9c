// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use crate::cli::args::ExtractArgs;
use crate::driver::extract_with_config;
use crate::manifest::Manifest;
use crate::{ExtractConfig, VERSION, error, info, section, verbose, warn};

/// Build the extraction config from command-line arguments.
#[must_use]
pub fn config_from_args(args: &ExtractArgs) -> ExtractConfig {
    let mut config = ExtractConfig::new()
        .with_output_dir(&args.output)
        .with_backend(args.backend)
        .with_dwpose_model(&args.dwpose_model)
        .with_pose_model(&args.pose_model)
        .with_confidence(args.conf)
        .with_iou(args.iou)
        .with_keypoint_threshold(args.kpt_threshold)
        .with_download(!args.no_download)
        .with_person_detector(!args.no_person_detector);

    if let Some(sz) = args.imgsz {
        config = config.with_imgsz(sz, sz);
    }
    if let Some(device) = args.device {
        config = config.with_device(device);
    }
    config
}

/// Run the extract command.
///
/// Exits with code 1 only when the manifest cannot be loaded. A batch that
/// ran, even with no successes, exits normally.
pub fn run_extract(args: &ExtractArgs) {
    crate::cli::logging::set_verbose(args.verbose);

    let manifest = match Manifest::load(&args.manifest) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("Cannot load manifest {}: {e}", args.manifest.display());
            process::exit(1);
        }
    };
    if manifest.is_empty() {
        warn!("Manifest {} has no entries", args.manifest.display());
    }

    let config = config_from_args(args);
    verbose!(
        "pose-skeletons {VERSION} | backend={} | device={} | {} pose(s) -> {}",
        config.backend,
        config.device.map_or_else(|| "cpu".to_string(), |d| d.to_string()),
        manifest.len(),
        config.output_dir.display()
    );

    let summary = extract_with_config(&manifest, &config);

    section!("Summary");
    if let Some(backend) = summary.backend {
        verbose!("Backend: {backend}");
    }
    for err in &summary.init_errors {
        warn!("{err}");
    }
    info!("{summary}");

    if summary.succeeded > 0 {
        info!("");
        info!("Next steps:");
        info!("  1. Review the skeletons in {}", config.output_dir.display());
        info!("  2. Use them as pose conditioning images in your generation pipeline");
    }
}

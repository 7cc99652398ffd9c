// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The extraction loop.
//!
//! [`run_pass`] pushes every manifest entry through one initialized backend and
//! records what happened to it. [`extract`] picks the backend, falling back from
//! the primary to the secondary for the whole batch if the primary cannot be
//! brought up.

use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;

use crate::backend::{
    BackendKind, Detection, DwposeBackend, PoseBackend, SkeletonOutput, YoloPoseBackend,
};
use crate::config::{BackendSelection, ExtractConfig};
use crate::error::Result;
use crate::image_io::{
    ChannelOrder, convert_order, image_to_array, load_image, save_png, save_rgb_png,
};
use crate::manifest::{Manifest, PoseEntry};
use crate::visualizer::{LandmarkStyle, draw_landmarks};

/// Why an entry produced no file without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Source image does not exist.
    MissingSource,
    /// Source image exists but could not be decoded.
    Unreadable,
    /// The backend returned output the driver cannot persist.
    UnsupportedOutput,
    /// The backend found no person.
    NoPoseDetected,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSource => write!(f, "source not found"),
            Self::Unreadable => write!(f, "unreadable image"),
            Self::UnsupportedOutput => write!(f, "unexpected output format"),
            Self::NoPoseDetected => write!(f, "no pose detected"),
        }
    }
}

/// What happened to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Skeleton written to this path.
    Saved(PathBuf),
    /// Nothing written, for an expected reason.
    Skipped(SkipReason),
    /// An error or panic interrupted the entry.
    Failed(String),
}

impl EntryOutcome {
    /// Whether a file was written.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

/// Outcomes of one pass over the manifest with a single backend.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Backend that ran the pass.
    pub backend: BackendKind,
    /// `(entry name, outcome)` in manifest order.
    pub outcomes: Vec<(String, EntryOutcome)>,
}

impl PassReport {
    /// Number of entries whose file was written.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_saved()).count()
    }
}

/// Result of a whole extraction run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Backend that processed the batch, if any could be initialized.
    pub backend: Option<BackendKind>,
    /// Entries whose file was written.
    pub succeeded: usize,
    /// Entries in the manifest.
    pub total: usize,
    /// `(entry name, outcome)` in manifest order. Empty if no backend ran.
    pub outcomes: Vec<(String, EntryOutcome)>,
    /// Initialization errors, one per backend that failed to come up.
    pub init_errors: Vec<String>,
}

impl RunSummary {
    fn from_pass(report: PassReport, total: usize, init_errors: Vec<String>) -> Self {
        Self {
            backend: Some(report.backend),
            succeeded: report.succeeded(),
            total,
            outcomes: report.outcomes,
            init_errors,
        }
    }

    fn no_backend(total: usize, init_errors: Vec<String>) -> Self {
        Self {
            backend: None,
            succeeded: 0,
            total,
            outcomes: Vec::new(),
            init_errors,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total: {}/{} succeeded", self.succeeded, self.total)
    }
}

/// Factory for a backend, called at most once per run.
pub type BackendInit<'a> = Box<dyn FnOnce() -> Result<Box<dyn PoseBackend>> + 'a>;

/// Run every manifest entry through `backend`, then close it.
///
/// Entries are processed in order. Missing or unreadable sources, unsupported
/// output and empty detections are skipped with a warning. Errors and panics
/// are logged and recorded, and never stop the pass.
pub fn run_pass(
    backend: &mut dyn PoseBackend,
    manifest: &Manifest,
    output_dir: &Path,
    style: &LandmarkStyle,
) -> PassReport {
    let kind = backend.kind();
    crate::section!("Extracting {} skeleton(s) with {kind}", manifest.len());

    if let Err(e) = fs::create_dir_all(output_dir) {
        crate::error!("Cannot create {}: {e}", output_dir.display());
        let message = format!("output directory unavailable: {e}");
        let outcomes = manifest
            .iter()
            .map(|entry| (entry.name.clone(), EntryOutcome::Failed(message.clone())))
            .collect();
        backend.close();
        return PassReport { backend: kind, outcomes };
    }

    let total = manifest.len();
    let mut outcomes = Vec::with_capacity(total);
    for (i, entry) in manifest.iter().enumerate() {
        crate::progress!(i + 1, total, "{}", entry.name);
        let start = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            process_entry(&mut *backend, entry, output_dir, style)
        }));

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                crate::error!("{}: {}", entry.name, error_chain(&err));
                EntryOutcome::Failed(err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                crate::error!("{}: panicked: {message}", entry.name);
                EntryOutcome::Failed(format!("panic: {message}"))
            }
        };

        if let EntryOutcome::Saved(path) = &outcome {
            crate::success!(
                "{} -> {} ({:.1}ms)",
                entry.name,
                path.display(),
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        outcomes.push((entry.name.clone(), outcome));
    }

    backend.close();
    PassReport { backend: kind, outcomes }
}

/// Steps for a single entry: load, convert, detect, persist.
fn process_entry(
    backend: &mut dyn PoseBackend,
    entry: &PoseEntry,
    output_dir: &Path,
    style: &LandmarkStyle,
) -> Result<EntryOutcome> {
    if !entry.source.exists() {
        crate::warn!("Source not found for {}: {}", entry.name, entry.source.display());
        return Ok(EntryOutcome::Skipped(SkipReason::MissingSource));
    }

    let image = match load_image(&entry.source) {
        Ok(image) => image,
        Err(e) => {
            crate::warn!("Cannot read {}: {e}", entry.source.display());
            return Ok(EntryOutcome::Skipped(SkipReason::Unreadable));
        }
    };
    let rgb = image_to_array(&image)?;
    let (height, width, _) = rgb.dim();
    let input = convert_order(rgb, ChannelOrder::Rgb, backend.input_order());

    let output_path = entry.output_path(output_dir);
    match backend.detect(&input)? {
        Detection::Skeleton(SkeletonOutput::Pixels { data, order }) => {
            save_png(&data, order, &output_path)?;
        }
        Detection::Skeleton(SkeletonOutput::Handle(handle)) => handle.save(&output_path)?,
        Detection::Skeleton(SkeletonOutput::Unsupported(kind)) => {
            crate::warn!("Unexpected output format for {}: {kind}", entry.name);
            return Ok(EntryOutcome::Skipped(SkipReason::UnsupportedOutput));
        }
        Detection::Landmarks(landmarks) => {
            let mut canvas = RgbImage::new(dimension(width)?, dimension(height)?);
            draw_landmarks(&mut canvas, &landmarks, style);
            save_rgb_png(&canvas, &output_path)?;
        }
        Detection::NoPose => {
            crate::warn!("No pose detected in {}", entry.name);
            return Ok(EntryOutcome::Skipped(SkipReason::NoPoseDetected));
        }
    }

    Ok(EntryOutcome::Saved(output_path))
}

fn dimension(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        crate::error::SkeletonError::ImageError(format!("image dimension {value} out of range"))
    })
}

/// `err` followed by each of its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str("\n  caused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Pick a backend according to `selection` and run the batch with it.
///
/// With [`BackendSelection::Auto`] the primary is tried first. If it fails to
/// initialize, the cause is logged and the secondary processes the full
/// manifest. A forced selection uses that backend only. When no backend comes
/// up, the summary reports zero successes and carries the errors.
pub fn extract(
    manifest: &Manifest,
    output_dir: &Path,
    selection: BackendSelection,
    style: &LandmarkStyle,
    init_primary: BackendInit<'_>,
    init_secondary: BackendInit<'_>,
) -> RunSummary {
    let total = manifest.len();
    let mut init_errors = Vec::new();

    let backend = match selection {
        BackendSelection::Auto => init_backend(init_primary, "Primary", &mut init_errors).or_else(|| {
            crate::warn!("Falling back to {}...", BackendKind::YoloPose);
            init_backend(init_secondary, "Secondary", &mut init_errors)
        }),
        BackendSelection::Dwpose => init_backend(init_primary, "Primary", &mut init_errors),
        BackendSelection::Yolo => init_backend(init_secondary, "Secondary", &mut init_errors),
    };

    match backend {
        Some(mut backend) => {
            let report = run_pass(backend.as_mut(), manifest, output_dir, style);
            RunSummary::from_pass(report, total, init_errors)
        }
        None => RunSummary::no_backend(total, init_errors),
    }
}

/// Call `init`, logging and recording a failure.
///
/// A panic during initialization (for instance an ONNX Runtime library that
/// cannot be loaded) counts as a failure, so the fallback still runs.
fn init_backend(
    init: BackendInit<'_>,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<Box<dyn PoseBackend>> {
    match panic::catch_unwind(AssertUnwindSafe(init)) {
        Ok(Ok(backend)) => Some(backend),
        Ok(Err(e)) => {
            match e.init_failure() {
                Some(cause) => crate::error!("{label} backend unavailable ({cause}): {e}"),
                None => crate::error!("{label} backend unavailable: {e}"),
            }
            errors.push(e.to_string());
            None
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            crate::error!("{label} backend initialization panicked: {message}");
            errors.push(format!("{label} backend initialization panicked: {message}"));
            None
        }
    }
}

/// Run a full extraction with the backends described by `config`.
pub fn extract_with_config(manifest: &Manifest, config: &ExtractConfig) -> RunSummary {
    let style = LandmarkStyle::with_threshold(config.keypoint_threshold);
    extract(
        manifest,
        &config.output_dir,
        config.backend,
        &style,
        Box::new(|| DwposeBackend::new(config).map(|b| Box::new(b) as Box<dyn PoseBackend>)),
        Box::new(|| YoloPoseBackend::new(config).map(|b| Box::new(b) as Box<dyn PoseBackend>)),
    )
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model resolution and downloading.
//!
//! Model paths given as bare file names of a known model are looked up in the
//! user cache directory (`<cache>/pose-skeletons/`) and downloaded there on
//! first use. Any other path must already exist.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Result, SkeletonError};

/// Default DWPose whole-body model name.
pub const DEFAULT_DWPOSE_MODEL: &str = "dw-ll_ucoco_384.onnx";

/// URL for downloading the default DWPose model.
const DEFAULT_DWPOSE_MODEL_URL: &str =
    "https://huggingface.co/yzd-v/DWPose/resolve/main/dw-ll_ucoco_384.onnx";

/// Default YOLO pose model name.
pub const DEFAULT_POSE_MODEL: &str = "yolo11n-pose.onnx";

/// URL for downloading the default YOLO pose model.
const DEFAULT_POSE_MODEL_URL: &str =
    "https://github.com/ultralytics/assets/releases/download/v8.3.0/yolo11n-pose.onnx";

/// Known downloadable models, by file name.
const KNOWN_MODELS: &[(&str, &str)] = &[
    (DEFAULT_DWPOSE_MODEL, DEFAULT_DWPOSE_MODEL_URL),
    (DEFAULT_POSE_MODEL, DEFAULT_POSE_MODEL_URL),
];

/// Name of the per-user model cache subdirectory.
const CACHE_SUBDIR: &str = "pose-skeletons";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

/// Directory where downloaded models are cached, if the platform has one.
#[must_use]
pub fn model_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(CACHE_SUBDIR))
}

/// Download URL for a known model file name.
fn known_model_url(filename: &str) -> Option<&'static str> {
    KNOWN_MODELS
        .iter()
        .find(|(name, _)| *name == filename)
        .map(|(_, url)| *url)
}

/// Resolve a model path, downloading a known model into the cache if needed.
///
/// # Arguments
///
/// * `model_path` - Path to an ONNX model, or the bare file name of a known model.
/// * `download` - Whether a missing known model may be fetched.
///
/// # Errors
///
/// Returns [`SkeletonError::ModelLoadError`] if the model does not exist and
/// cannot be downloaded, and [`SkeletonError::Download`] if the download
/// itself fails.
pub fn resolve_model<P: AsRef<Path>>(model_path: P, download: bool) -> Result<PathBuf> {
    resolve_model_in(model_path.as_ref(), download, model_cache_dir().as_deref())
}

fn resolve_model_in(path: &Path, download: bool, cache_dir: Option<&Path>) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let is_bare_name = path.parent().is_none_or(|p| p.as_os_str().is_empty());

    let Some(url) = known_model_url(filename) else {
        let known: Vec<&str> = KNOWN_MODELS.iter().map(|(name, _)| *name).collect();
        return Err(SkeletonError::ModelLoadError(format!(
            "Model file not found: {}. Auto-download is supported for: {}",
            path.display(),
            known.join(", ")
        )));
    };

    // Known models named by bare file name live in the cache directory.
    let dest = match (is_bare_name, cache_dir) {
        (true, Some(dir)) => dir.join(filename),
        _ => path.to_path_buf(),
    };

    if dest.exists() {
        return Ok(dest);
    }

    if !download {
        return Err(SkeletonError::ModelLoadError(format!(
            "Model file not found: {} (automatic download disabled)",
            dest.display()
        )));
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            SkeletonError::Download(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }

    download_file(url, &dest)?;
    Ok(dest)
}

/// Format bytes as human-readable string (e.g., "10.4MB").
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format elapsed seconds as `5.5s` or `1:05.0`.
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else {
        let mins = (seconds / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{mins}:{secs:04.1}")
    }
}

/// Progress bar of `width` cells.
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64) as usize;
    let partial = progress * width as f64 - filled as f64;

    let mut bar = "━".repeat(filled);
    if filled < width {
        if partial > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

/// Stream `url` into `dest` with a progress line on stderr.
///
/// Data lands in `<dest>.part` first and is renamed into place once complete,
/// so an interrupted download never leaves a truncated model behind.
fn download_file(url: &str, dest: &Path) -> Result<()> {
    const BAR_WIDTH: usize = 12;
    const MIN_UPDATE_INTERVAL: f64 = 0.1;

    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        SkeletonError::Download(match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        })
    })?;

    let total_size: u64 = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);

    let temp_file = File::create(&temp_path).map_err(|e| {
        SkeletonError::Download(format!("Failed to create temp file {}: {e}", temp_path.display()))
    })?;
    let mut writer = BufWriter::new(temp_file);
    let mut reader = response.into_body().into_reader();

    let desc = format!("Downloading {url} to '{}'", dest.display());
    let start_time = Instant::now();
    let mut last_update = start_time;
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];

    let streamed: Result<()> = (|| {
        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .map_err(|e| SkeletonError::Download(format!("Failed to read from network: {e}")))?;
            if bytes_read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| SkeletonError::Download(format!("Failed to write temp file: {e}")))?;
            downloaded += bytes_read as u64;

            let now = Instant::now();
            if now.duration_since(last_update).as_secs_f64() < MIN_UPDATE_INTERVAL {
                continue;
            }
            last_update = now;

            let elapsed = start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };
            if total_size > 0 {
                let progress = (downloaded as f64 / total_size as f64).min(1.0);
                eprint!(
                    "\r\x1b[K{desc}: {}% {} {}/{} {}/s {}",
                    (progress * 100.0) as u8,
                    generate_bar(progress, BAR_WIDTH),
                    format_bytes(downloaded as f64),
                    format_bytes(total_size as f64),
                    format_bytes(rate),
                    format_time(elapsed)
                );
            } else {
                eprint!(
                    "\r\x1b[K{desc}: {} {}/s {}",
                    format_bytes(downloaded as f64),
                    format_bytes(rate),
                    format_time(elapsed)
                );
            }
            std::io::stderr().flush().ok();
        }
        writer
            .flush()
            .map_err(|e| SkeletonError::Download(format!("Failed to flush temp file: {e}")))
    })();

    if let Err(e) = streamed {
        eprintln!();
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if total_size > 0 && downloaded < total_size {
        eprintln!();
        let _ = fs::remove_file(&temp_path);
        return Err(SkeletonError::Download(format!(
            "Incomplete download of {url}: received {} of {}",
            format_bytes(downloaded as f64),
            format_bytes(total_size as f64)
        )));
    }

    let elapsed = start_time.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };
    eprintln!(
        "\r\x1b[K{desc}: 100% {} {} {}/s {}",
        generate_bar(1.0, BAR_WIDTH),
        format_bytes(downloaded as f64),
        format_bytes(rate),
        format_time(elapsed)
    );

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        SkeletonError::Download(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

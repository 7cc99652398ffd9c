// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Execution devices and ONNX Runtime session construction.
//!
//! Both pose backends build their sessions through [`build_session`], so the
//! device choice, graph optimization level and thread count are applied the
//! same way regardless of which model is loaded.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};

use crate::error::{Result, SkeletonError};

/// Hardware device for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// CPU execution (always available).
    Cpu,
    /// NVIDIA GPU through CUDA. The argument is the device index.
    Cuda(usize),
    /// NVIDIA GPU through `TensorRT`. The argument is the device index.
    TensorRt(usize),
    /// Apple `CoreML` (also selected by `mps`).
    CoreMl,
    /// Intel `OpenVINO`.
    OpenVino,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::TensorRt(i) => write!(f, "tensorrt:{i}"),
            Self::CoreMl => write!(f, "coreml"),
            Self::OpenVino => write!(f, "openvino"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            "mps" | "coreml" => Ok(Self::CoreMl),
            "openvino" => Ok(Self::OpenVino),
            _ => {
                if let Some(rest) = s.strip_prefix("cuda") {
                    Ok(Self::Cuda(parse_device_index(rest)?))
                } else if let Some(rest) = s.strip_prefix("tensorrt") {
                    Ok(Self::TensorRt(parse_device_index(rest)?))
                } else {
                    Err(format!(
                        "Unknown device: {s} (expected cpu, cuda[:N], tensorrt[:N], coreml, mps, openvino)"
                    ))
                }
            }
        }
    }
}

/// Parse the `:N` suffix of a device string. An empty suffix means index 0.
fn parse_device_index(s: &str) -> std::result::Result<usize, String> {
    if s.is_empty() {
        return Ok(0);
    }
    s.strip_prefix(':')
        .and_then(|index| index.parse::<usize>().ok())
        .ok_or_else(|| format!("Invalid device index '{s}'"))
}

/// Register the execution provider for `device` on a session builder.
///
/// Devices whose Cargo feature is not enabled produce a config error instead of
/// silently running on CPU.
#[allow(unused_mut, clippy::needless_pass_by_value)]
fn with_device(mut builder: SessionBuilder, device: Device) -> Result<SessionBuilder> {
    let unavailable = |feature: &str| {
        SkeletonError::ConfigError(format!(
            "device '{device}' requires building with the '{feature}' feature"
        ))
    };

    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda(_index) => {
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                builder = builder
                    .with_execution_providers([CUDAExecutionProvider::default()
                        .with_device_id(_index as i32)
                        .build()])
                    .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to register CUDA EP: {e}")))?;
                return Ok(builder);
            }
            #[cfg(not(feature = "cuda"))]
            Err(unavailable("cuda"))
        }
        Device::TensorRt(_index) => {
            #[cfg(feature = "tensorrt")]
            {
                use ort::execution_providers::TensorRTExecutionProvider;
                builder = builder
                    .with_execution_providers([TensorRTExecutionProvider::default()
                        .with_device_id(_index as i32)
                        .build()])
                    .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to register TensorRT EP: {e}")))?;
                return Ok(builder);
            }
            #[cfg(not(feature = "tensorrt"))]
            Err(unavailable("tensorrt"))
        }
        Device::CoreMl => {
            #[cfg(feature = "coreml")]
            {
                use ort::execution_providers::CoreMLExecutionProvider;
                builder = builder
                    .with_execution_providers([CoreMLExecutionProvider::default()
                        .with_subgraphs(true)
                        .build()])
                    .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to register CoreML EP: {e}")))?;
                return Ok(builder);
            }
            #[cfg(not(feature = "coreml"))]
            Err(unavailable("coreml"))
        }
        Device::OpenVino => {
            #[cfg(feature = "openvino")]
            {
                use ort::execution_providers::OpenVINOExecutionProvider;
                builder = builder
                    .with_execution_providers([OpenVINOExecutionProvider::default().build()])
                    .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to register OpenVINO EP: {e}")))?;
                return Ok(builder);
            }
            #[cfg(not(feature = "openvino"))]
            Err(unavailable("openvino"))
        }
    }
}

/// Build an optimized ONNX Runtime session for the model at `path`.
///
/// # Arguments
///
/// * `path` - ONNX model file. Must exist.
/// * `device` - Execution device. `None` runs on CPU.
/// * `num_threads` - Intra-op threads. `0` lets the runtime decide.
///
/// # Errors
///
/// Returns [`SkeletonError::ConfigError`] for a device whose feature is not
/// compiled in, and [`SkeletonError::ModelLoadError`] if ONNX Runtime rejects
/// the model.
pub fn build_session(path: &Path, device: Option<Device>, num_threads: usize) -> Result<Session> {
    let builder = Session::builder()
        .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to create session builder: {e}")))?;

    let builder = with_device(builder, device.unwrap_or(Device::Cpu))?;

    builder
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(num_threads)
        .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to set intra-thread count: {e}")))?
        .commit_from_file(path)
        .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to load model {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("CUDA").unwrap(), Device::Cuda(0));
        assert_eq!(Device::from_str("cuda:1").unwrap(), Device::Cuda(1));
        assert_eq!(Device::from_str("tensorrt:2").unwrap(), Device::TensorRt(2));
        assert_eq!(Device::from_str("mps").unwrap(), Device::CoreMl);
        assert_eq!(Device::from_str("openvino").unwrap(), Device::OpenVino);
    }

    #[test]
    fn test_parse_device_rejects_garbage() {
        assert!(Device::from_str("tpu").is_err());
        assert!(Device::from_str("cuda:x").is_err());
        assert!(Device::from_str("cuda0").is_err());
    }

    #[test]
    fn test_device_display_round_trips() {
        for device in [Device::Cpu, Device::Cuda(3), Device::TensorRt(0), Device::CoreMl] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_missing_feature_is_config_error() {
        let err = build_session(Path::new("missing.onnx"), Some(Device::Cuda(0)), 0).unwrap_err();
        assert!(matches!(err, SkeletonError::ConfigError(_)));
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for skeleton extraction.

use std::fmt;

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, SkeletonError>;

/// Why a backend could not be brought up before its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitFailure {
    /// The model file is absent and could not be fetched automatically.
    MissingModel,
    /// The model download itself failed (network, disk, timeout).
    Download,
    /// ONNX Runtime rejected the model or the session could not be built.
    Runtime,
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingModel => write!(f, "missing model"),
            Self::Download => write!(f, "download failure"),
            Self::Runtime => write!(f, "runtime failure"),
        }
    }
}

/// Main error type for skeleton extraction.
#[derive(Debug, thiserror::Error)]
pub enum SkeletonError {
    /// Error loading the ONNX model.
    #[error("Model load error: {0}")]
    ModelLoadError(String),
    /// Error during model inference.
    #[error("Inference error: {0}")]
    InferenceError(String),
    /// Error decoding, converting or encoding images.
    #[error("Image error: {0}")]
    ImageError(String),
    /// Invalid configuration provided.
    #[error("Config error: {0}")]
    ConfigError(String),
    /// Invalid or unreadable pose manifest.
    #[error("Manifest error: {0}")]
    ManifestError(String),
    /// Wrapped `std::io::Error`.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Model download failed.
    #[error("Download error: {0}")]
    Download(String),
    /// A backend failed during initialization.
    #[error("{backend} initialization failed ({cause}): {message}")]
    BackendInit {
        /// Backend display name.
        backend: String,
        /// Classified cause.
        cause: InitFailure,
        /// Underlying message.
        message: String,
    },
}

impl SkeletonError {
    /// Classified cause if this is a backend initialization error.
    #[must_use]
    pub const fn init_failure(&self) -> Option<InitFailure> {
        match self {
            Self::BackendInit { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}

impl From<image::ImageError> for SkeletonError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for SkeletonError {
    fn from(err: serde_json::Error) -> Self {
        Self::ManifestError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SkeletonError::ModelLoadError("test".to_string());
        assert_eq!(err.to_string(), "Model load error: test");

        let err = SkeletonError::InferenceError("test".to_string());
        assert_eq!(err.to_string(), "Inference error: test");
    }

    #[test]
    fn test_backend_init_display() {
        let err = SkeletonError::BackendInit {
            backend: "DWPose".to_string(),
            cause: InitFailure::MissingModel,
            message: "dw-ll_ucoco_384.onnx not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DWPose initialization failed (missing model): dw-ll_ucoco_384.onnx not found"
        );
        assert_eq!(err.init_failure(), Some(InitFailure::MissingModel));
        assert_eq!(SkeletonError::ConfigError(String::new()).init_failure(), None);
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;
        let err: SkeletonError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
    }
}

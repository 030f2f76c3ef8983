//! Error types for argus

use std::time::Duration;

use thiserror::Error;

use crate::capture::PixelFormat;

/// Boxed error used by detector backends to report foreign failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Library errors (setup, configuration, frame acquisition)
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no tokio runtime available to bind the pipeline to")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("invalid rotation: {0} degrees (expected 0, 90, 180 or 270)")]
    InvalidRotation(u32),

    #[error("invalid image geometry {width}x{height}: dimensions must be positive")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("buffer pool exhausted ({capacity} frames outstanding)")]
    PoolExhausted { capacity: usize },

    #[error("image buffer does not match {width}x{height} {format:?}")]
    BufferMismatch {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reported by a detector for a single frame.
///
/// Delivered at most once per accepted frame through `ResultSink::on_error`;
/// the pipeline never retries.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("detection failed: {0}")]
    Failed(String),

    #[error("detection timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported pixel format for detection: {0:?}")]
    UnsupportedFormat(PixelFormat),

    #[error("detector backend error: {0}")]
    Backend(#[source] BoxError),
}

impl DetectError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::Failed(_) => "failed",
            DetectError::Timeout(_) => "timeout",
            DetectError::UnsupportedFormat(_) => "unsupported_format",
            DetectError::Backend(_) => "backend",
        }
    }
}

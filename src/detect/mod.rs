//! Detector capability and bundled detectors

pub mod luma;
pub mod timeout;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::DetectError;

pub use luma::LumaDetector;
pub use timeout::TimeoutDetector;

/// Asynchronous detection over a single frame.
///
/// The frame is borrowed for the duration of the returned future only. A
/// detector may clone the `Bytes` buffer for off-thread work but must not keep
/// it past completion. Each call completes exactly once.
///
/// The pipeline never runs two `detect` calls at the same time.
#[async_trait]
pub trait Detector: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Backend identifier used in logs
    fn name(&self) -> &'static str;

    async fn detect(&self, frame: &Frame) -> Result<Self::Output, DetectError>;
}

/// Axis-aligned box in buffer pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// One detected entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub bbox: BoundingBox,
    /// Confidence in `[0, 1]`
    pub score: f32,
}

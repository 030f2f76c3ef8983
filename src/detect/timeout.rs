//! Detector-side deadline
//!
//! The pipeline itself never times out a detection; a hung detector parks it
//! in `Busy`. Wrapping the detector bounds that.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::Detector;
use crate::capture::Frame;
use crate::DetectError;

pub struct TimeoutDetector<D> {
    inner: D,
    timeout: Duration,
}

impl<D: Detector> TimeoutDetector<D> {
    pub fn new(inner: D, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<D: Detector> Detector for TimeoutDetector<D> {
    type Output = D::Output;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn detect(&self, frame: &Frame) -> Result<Self::Output, DetectError> {
        match tokio::time::timeout(self.timeout, self.inner.detect(frame)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    detector = self.inner.name(),
                    sequence = frame.meta.sequence,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Detection exceeded deadline"
                );
                Err(DetectError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat, Rotation};

    struct Never;

    #[async_trait]
    impl Detector for Never {
        type Output = ();

        fn name(&self) -> &'static str {
            "never"
        }

        async fn detect(&self, _frame: &Frame) -> Result<(), DetectError> {
            std::future::pending().await
        }
    }

    struct Immediate;

    #[async_trait]
    impl Detector for Immediate {
        type Output = u32;

        fn name(&self) -> &'static str {
            "instant"
        }

        async fn detect(&self, _frame: &Frame) -> Result<u32, DetectError> {
            Ok(7)
        }
    }

    fn frame() -> Frame {
        Frame::new(
            Bytes::new(),
            FrameMetadata {
                sequence: 1,
                width: 0,
                height: 0,
                stride: 0,
                format: PixelFormat::Rgb24,
                rotation: Rotation::Deg0,
            },
        )
    }

    #[tokio::test]
    async fn hung_detector_times_out() {
        let detector = TimeoutDetector::new(Never, Duration::from_millis(20));
        let err = detector.detect(&frame()).await.unwrap_err();
        assert!(matches!(err, DetectError::Timeout(d) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn fast_detector_passes_through() {
        let detector = TimeoutDetector::new(Immediate, Duration::from_secs(1));
        assert_eq!(detector.detect(&frame()).await.unwrap(), 7);
    }
}

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Error;

/// Frame data with zero-copy semantics
#[derive(Clone)]
pub struct Frame {
    /// Immutable pixel buffer - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(data: Bytes, meta: FrameMetadata) -> Self {
        Self {
            data,
            meta: Arc::new(meta),
            timestamp: Instant::now(),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("meta", &self.meta)
            .finish()
    }
}

/// Frame metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Monotonic per-source counter, diagnostic only
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
    pub rotation: Rotation,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv4,
    Mjpeg,
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, `None` for compressed/planar ones
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(3),
            PixelFormat::Yuyv4 => Some(2),
            PixelFormat::Mjpeg | PixelFormat::Nv12 => None,
        }
    }
}

/// Clockwise rotation that must be applied to the buffer to display it upright
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when the upright image has the buffer's width and height swapped
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = Error;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(Error::InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Receives frames back from whoever held them last.
///
/// Called exactly once per [`FrameHandle`].
pub trait FrameRecycler: Send + Sync {
    fn recycle(&self, frame: &Frame);
}

/// Exclusively-owned frame resource.
///
/// Ownership moves from the frame source into the pipeline on submission.
/// The underlying buffer goes back to its recycler exactly once, either via
/// [`FrameHandle::release`] or when the handle is dropped, so every exit path
/// (drop, failure, task abort, unwinding) releases it.
pub struct FrameHandle {
    frame: Frame,
    recycler: Option<Arc<dyn FrameRecycler>>,
}

impl FrameHandle {
    /// Handle whose release returns the buffer to `recycler`
    pub fn new(frame: Frame, recycler: Arc<dyn FrameRecycler>) -> Self {
        Self {
            frame,
            recycler: Some(recycler),
        }
    }

    /// Handle with no backing pool; release only drops the buffer reference
    pub fn detached(frame: Frame) -> Self {
        Self {
            frame,
            recycler: None,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn sequence(&self) -> u64 {
        self.frame.meta.sequence
    }

    /// Give the frame back to its source now
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(recycler) = self.recycler.take() {
            trace!(sequence = self.frame.meta.sequence, "Releasing frame");
            recycler.recycle(&self.frame);
        }
    }
}

impl Deref for FrameHandle {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("frame", &self.frame)
            .field("released", &self.recycler.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl FrameRecycler for Counter {
        fn recycle(&self, _frame: &Frame) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame(sequence: u64) -> Frame {
        Frame::new(
            Bytes::from_static(&[0; 12]),
            FrameMetadata {
                sequence,
                width: 2,
                height: 2,
                stride: 6,
                format: PixelFormat::Rgb24,
                rotation: Rotation::Deg0,
            },
        )
    }

    #[test]
    fn rotation_accepts_only_right_angles() {
        assert_eq!(Rotation::try_from(270u32).unwrap(), Rotation::Deg270);
        assert!(matches!(
            Rotation::try_from(45u32),
            Err(Error::InvalidRotation(45))
        ));
        assert!(Rotation::Deg90.is_transposed());
        assert!(!Rotation::Deg180.is_transposed());
    }

    #[test]
    fn explicit_release_does_not_release_again_on_drop() {
        let counter = Arc::new(Counter::default());
        let handle = FrameHandle::new(frame(1), counter.clone());
        handle.release();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_once() {
        let counter = Arc::new(Counter::default());
        {
            let _handle = FrameHandle::new(frame(2), counter.clone());
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}

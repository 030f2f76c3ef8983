//! Renderer-facing overlay state
//!
//! The overlay holds the cached source image geometry and the most recently
//! presented scene. A renderer reads both lock-free; the pipeline's sink
//! builds a new scene per frame and publishes it on `end_frame`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tracing::{debug, error, info};

use crate::pipeline::ResultSink;
use crate::{DetectError, Error, Result};

/// Upright source image size as seen by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSourceInfo {
    pub width: u32,
    pub height: u32,
    /// Horizontally mirrored (front-facing lens)
    pub flipped: bool,
}

impl ImageSourceInfo {
    pub fn new(width: u32, height: u32, flipped: bool) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGeometry { width, height });
        }
        Ok(Self {
            width,
            height,
            flipped,
        })
    }
}

/// One presented frame's worth of entities
#[derive(Debug)]
pub struct Scene<T> {
    pub items: Vec<T>,
    /// Increments on every publish, so a renderer can detect changes
    pub generation: u64,
}

pub struct Overlay<T> {
    source: ArcSwapOption<ImageSourceInfo>,
    scene: ArcSwap<Scene<T>>,
    generation: AtomicU64,
}

impl<T> Default for Overlay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Overlay<T> {
    pub fn new() -> Self {
        Self {
            source: ArcSwapOption::empty(),
            scene: ArcSwap::from_pointee(Scene {
                items: Vec::new(),
                generation: 0,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn set_image_source_info(&self, info: ImageSourceInfo) {
        info!(
            width = info.width,
            height = info.height,
            flipped = info.flipped,
            "Overlay source geometry updated"
        );
        self.source.store(Some(Arc::new(info)));
    }

    pub fn image_source_info(&self) -> Option<ImageSourceInfo> {
        self.source.load().as_deref().copied()
    }

    /// Latest presented scene
    pub fn scene(&self) -> Arc<Scene<T>> {
        self.scene.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the presented scene and invalidate
    pub fn present(&self, items: Vec<T>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.scene.store(Arc::new(Scene { items, generation }));
        generation
    }
}

/// Sink that draws detection results onto an [`Overlay`].
///
/// Clears on `begin_frame`, collects on `on_result`, and presents on
/// `end_frame`. Errors are logged and leave the overlay empty.
pub struct OverlaySink<T> {
    overlay: Arc<Overlay<T>>,
    pending: Vec<T>,
}

impl<T> OverlaySink<T> {
    pub fn new(overlay: Arc<Overlay<T>>) -> Self {
        Self {
            overlay,
            pending: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> ResultSink<Vec<T>> for OverlaySink<T> {
    fn begin_frame(&mut self) {
        self.pending.clear();
    }

    fn on_result(&mut self, result: Vec<T>) {
        self.pending.extend(result);
    }

    fn on_error(&mut self, error: DetectError) {
        error!(%error, "Detection failed, clearing overlay");
        self.pending.clear();
    }

    fn end_frame(&mut self) {
        let count = self.pending.len();
        let generation = self.overlay.present(std::mem::take(&mut self.pending));
        debug!(count, generation, "Overlay invalidated");
    }
}

//! Glue between a frame source and the pipeline
//!
//! The renderer needs the upright source geometry before the first result for
//! a stream arrives. The adapter computes it from the first frame, stores it on
//! the overlay, and only then submits. Later frames skip the computation
//! unless the cache was invalidated or the frame's rotation changed.

use std::sync::Arc;

use tracing::{instrument, warn};

use super::frame::{FrameHandle, FrameMetadata, Rotation};
use crate::detect::Detector;
use crate::display::{ImageSourceInfo, Overlay};
use crate::pipeline::{Pipeline, SubmitOutcome};
use crate::Result;

pub struct SourceAdapter<D: Detector, T> {
    pipeline: Arc<Pipeline<D>>,
    overlay: Arc<Overlay<T>>,
    mirrored: bool,
    cached: Option<(Rotation, ImageSourceInfo)>,
}

impl<D: Detector, T> SourceAdapter<D, T> {
    pub fn new(pipeline: Arc<Pipeline<D>>, overlay: Arc<Overlay<T>>, mirrored: bool) -> Self {
        Self {
            pipeline,
            overlay,
            mirrored,
            cached: None,
        }
    }

    /// Force a geometry refresh on the next frame (e.g. after rebinding the
    /// camera)
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn geometry(&self) -> Option<ImageSourceInfo> {
        self.cached.map(|(_, info)| info)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline<D>> {
        &self.pipeline
    }

    /// Update geometry if needed, then submit the frame.
    ///
    /// On a geometry error the frame is released and not submitted.
    #[instrument(skip_all, fields(sequence = frame.sequence()))]
    pub fn on_frame(&mut self, frame: FrameHandle) -> Result<SubmitOutcome> {
        let rotation = frame.meta.rotation;
        match self.cached {
            Some((cached, _)) if cached == rotation => {}
            previous => {
                if let Some((cached, _)) = previous {
                    warn!(%cached, %rotation, "Frame rotation changed, refreshing geometry");
                }
                let info = upright_geometry(&frame.meta, self.mirrored)?;
                self.overlay.set_image_source_info(info);
                self.cached = Some((rotation, info));
            }
        }

        Ok(self.pipeline.submit(frame))
    }
}

/// Source size as displayed: width and height swap for 90/270 rotations
pub fn upright_geometry(meta: &FrameMetadata, mirrored: bool) -> Result<ImageSourceInfo> {
    if meta.rotation.is_transposed() {
        ImageSourceInfo::new(meta.height, meta.width, mirrored)
    } else {
        ImageSourceInfo::new(meta.width, meta.height, mirrored)
    }
}

//! Bright region detector
//!
//! Thresholds the luma of a packed RGB/BGR frame and reports the bounding box
//! of the bright pixels. Runs on the blocking pool so the async runtime keeps
//! serving the frame source.

use async_trait::async_trait;
use image::{ImageBuffer, Rgb};
use tracing::{debug, instrument, trace, warn};

use super::{BoundingBox, Detection, Detector};
use crate::capture::{Frame, FrameMetadata, PixelFormat};
use crate::{DetectError, DetectorConfig};

pub struct LumaDetector {
    config: DetectorConfig,
}

impl LumaDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Detector for LumaDetector {
    type Output = Vec<Detection>;

    fn name(&self) -> &'static str {
        "luma"
    }

    #[instrument(skip(self, frame), fields(sequence = frame.meta.sequence))]
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        let format = frame.meta.format;
        if !matches!(format, PixelFormat::Rgb24 | PixelFormat::Bgr24) {
            return Err(DetectError::UnsupportedFormat(format));
        }

        // Bytes clone is a refcount bump; the buffer is only read on the worker
        let data = frame.data.clone();
        let meta = frame.meta.clone();
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || detect_sync(&data, &meta, &config))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Luma detection task panicked");
                Err(DetectError::Failed(format!("detection task failed: {e}")))
            })
    }
}

fn detect_sync(
    data: &[u8],
    meta: &FrameMetadata,
    config: &DetectorConfig,
) -> Result<Vec<Detection>, DetectError> {
    let start = std::time::Instant::now();
    let row_bytes = meta.width as usize * 3;
    let stride = meta.stride as usize;
    let needed = stride * meta.height.saturating_sub(1) as usize + row_bytes;
    if meta.width == 0 || meta.height == 0 || stride < row_bytes || data.len() < needed {
        return Err(DetectError::Failed(format!(
            "buffer of {} bytes does not hold a {}x{} frame with stride {}",
            data.len(),
            meta.width,
            meta.height,
            meta.stride
        )));
    }

    // Copy rows without stride padding when the source is padded
    let packed = if stride == row_bytes {
        data[..row_bytes * meta.height as usize].to_vec()
    } else {
        data.chunks(stride)
            .take(meta.height as usize)
            .flat_map(|row| &row[..row_bytes])
            .copied()
            .collect()
    };

    let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(meta.width, meta.height, packed).ok_or_else(|| {
            DetectError::Failed("pixel buffer does not match frame dimensions".into())
        })?;

    let (r_weight, b_weight) = match meta.format {
        PixelFormat::Bgr24 => (114u32, 299u32),
        _ => (299, 114),
    };

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut bright: u64 = 0;

    for (x, y, pixel) in image.enumerate_pixels() {
        let [c0, c1, c2] = pixel.0;
        let luma = (c0 as u32 * r_weight + c1 as u32 * 587 + c2 as u32 * b_weight) / 1000;
        if luma >= config.threshold as u32 {
            bright += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    trace!(
        bright,
        elapsed_us = start.elapsed().as_micros() as u64,
        "Luma scan complete"
    );

    // An empty scan leaves the bounds unset, whatever min_area allows
    if bright == 0 || bright < config.min_area as u64 {
        return Ok(Vec::new());
    }

    let bbox = BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    };
    let score = (bright as f64 / bbox.area() as f64) as f32;

    debug!(
        x = bbox.x,
        y = bbox.y,
        width = bbox.width,
        height = bbox.height,
        score,
        "Detected bright region"
    );

    Ok(vec![Detection {
        label: config.label.clone(),
        bbox,
        score,
    }])
}

//! Synthetic test-pattern capture
//!
//! Stands in for a camera: paces frames at the configured rate, draws a moving
//! bright square on a dark background, and hands each frame out through a
//! bounded [`BufferPool`] just like a driver's capture buffers.

use std::sync::Arc;

use bytes::Bytes;
use image::{Rgb, RgbImage};
use tokio::time::{self, Duration, Interval, MissedTickBehavior};
use tracing::{info, instrument};

use super::frame::{Frame, FrameHandle, FrameMetadata};
use super::pool::BufferPool;
use crate::{CaptureConfig, Error, Result};

const BACKGROUND: Rgb<u8> = Rgb([16, 16, 16]);
const FOREGROUND: Rgb<u8> = Rgb([240, 240, 240]);

pub struct SyntheticCapture {
    config: CaptureConfig,
    pool: Arc<BufferPool>,
    ticker: Option<Interval>,
    sequence: u64,
}

impl SyntheticCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        if config.format.bytes_per_pixel() != Some(3) {
            return Err(Error::InvalidConfig(format!(
                "synthetic capture only produces packed 24-bit frames, not {:?}",
                config.format
            )));
        }
        if config.width == 0 || config.height == 0 || config.fps == 0 {
            return Err(Error::InvalidConfig(
                "synthetic capture needs non-zero size and fps".into(),
            ));
        }

        info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            rotation = %config.rotation,
            buffers = config.buffer_count,
            "Initializing synthetic capture"
        );

        Ok(Self {
            pool: BufferPool::new(config.buffer_count as usize),
            config,
            ticker: None,
            sequence: 0,
        })
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Wait for the next frame slot and produce a frame.
    ///
    /// Fails with [`Error::PoolExhausted`] while every buffer is still held
    /// downstream; the frame for that tick is skipped.
    #[instrument(skip(self))]
    pub async fn capture_frame(&mut self) -> Result<FrameHandle> {
        let period = Duration::from_secs_f64(1.0 / self.config.fps as f64);
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        ticker.tick().await;

        self.sequence += 1;
        let frame = Frame::new(
            self.render(self.sequence),
            FrameMetadata {
                sequence: self.sequence,
                width: self.config.width,
                height: self.config.height,
                stride: self.config.width * 3,
                format: self.config.format,
                rotation: self.config.rotation,
            },
        );

        self.pool.checkout(frame)
    }

    fn render(&self, sequence: u64) -> Bytes {
        let (width, height) = (self.config.width, self.config.height);
        let side = (width.min(height) / 6).max(1);
        let span_x = (width - side).max(1) as u64;
        let span_y = (height - side).max(1) as u64;
        let left = ((sequence * 4) % span_x) as u32;
        let top = ((sequence * 2) % span_y) as u32;

        let image = RgbImage::from_fn(width, height, |x, y| {
            if (left..left + side).contains(&x) && (top..top + side).contains(&y) {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
        Bytes::from(image.into_raw())
    }
}

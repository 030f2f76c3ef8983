//! Bounded pool of capture slots
//!
//! Mirrors a driver's fixed set of capture buffers: a frame handed out by the
//! pool occupies a slot until its [`FrameHandle`] is released. A leaked handle
//! shows up as a slot that never comes back.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use tracing::trace;

use super::frame::{Frame, FrameHandle, FrameRecycler};
use crate::{Error, Result};

pub struct BufferPool {
    capacity: usize,
    outstanding: CachePadded<AtomicUsize>,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            outstanding: CachePadded::new(AtomicUsize::new(0)),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Take a free slot for `frame`, failing when every slot is outstanding
    pub fn checkout(self: &Arc<Self>, frame: Frame) -> Result<FrameHandle> {
        let claimed = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            });
        if claimed.is_err() {
            return Err(Error::PoolExhausted {
                capacity: self.capacity,
            });
        }

        self.acquired.fetch_add(1, Ordering::Relaxed);
        let recycler: Arc<dyn FrameRecycler> = self.clone();
        Ok(FrameHandle::new(frame, recycler))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held by live frame handles
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

impl FrameRecycler for BufferPool {
    fn recycle(&self, frame: &Frame) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.released.fetch_add(1, Ordering::Relaxed);
        trace!(sequence = frame.meta.sequence, "Slot returned to pool");
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat, Rotation};

    fn frame(sequence: u64) -> Frame {
        Frame::new(
            Bytes::new(),
            FrameMetadata {
                sequence,
                width: 1,
                height: 1,
                stride: 3,
                format: PixelFormat::Rgb24,
                rotation: Rotation::Deg0,
            },
        )
    }

    #[test]
    fn exhausted_pool_refuses_until_a_slot_returns() {
        let pool = BufferPool::new(2);
        let a = pool.checkout(frame(1)).unwrap();
        let _b = pool.checkout(frame(2)).unwrap();
        assert!(matches!(
            pool.checkout(frame(3)),
            Err(Error::PoolExhausted { capacity: 2 })
        ));

        a.release();
        assert_eq!(pool.outstanding(), 1);
        assert!(pool.checkout(frame(4)).is_ok());
        assert_eq!(pool.acquired(), 3);
        // frame 4's handle was dropped at the end of the statement above
        assert_eq!(pool.released(), 2);
    }
}

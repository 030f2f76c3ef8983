//! Lock-free pipeline state word
//!
//! The running flag and the in-flight flag share one atomic byte so the
//! drop-if-busy check and the shutdown check are a single compare-and-swap.

use std::sync::atomic::{AtomicU8, Ordering};

const STOPPED: u8 = 0b001;
const BUSY: u8 = 0b010;
const ABORTED: u8 = 0b100;

/// Observable pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Running, nothing in flight
    Idle,
    /// Running, one detection outstanding
    Busy,
    /// Shut down; a detection started earlier may still be draining
    Stopped,
}

/// Why a submitted frame was dropped without reaching the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Submission arrived after shutdown
    Stopped,
    /// Another frame is in flight (backpressure)
    Busy,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Stopped => "stopped",
            DropReason::Busy => "busy",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    /// Claim the single in-flight slot
    pub(crate) fn try_begin(&self) -> Result<(), DropReason> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current & STOPPED != 0 {
                return Err(DropReason::Stopped);
            }
            if current & BUSY != 0 {
                return Err(DropReason::Busy);
            }
            match self.0.compare_exchange_weak(
                current,
                current | BUSY,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn finish(&self) {
        self.0.fetch_and(!BUSY, Ordering::Release);
    }

    /// Returns true only for the call that actually stopped the pipeline
    pub(crate) fn stop(&self, abort: bool) -> bool {
        let bits = if abort { STOPPED | ABORTED } else { STOPPED };
        // SeqCst pairs with the in-flight task's `is_aborted` check
        let previous = self.0.fetch_or(bits, Ordering::SeqCst);
        previous & STOPPED == 0
    }

    pub(crate) fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire) & STOPPED == 0
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire) & BUSY != 0
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst) & ABORTED != 0
    }

    pub(crate) fn get(&self) -> PipelineState {
        let bits = self.0.load(Ordering::Acquire);
        if bits & STOPPED != 0 {
            PipelineState::Stopped
        } else if bits & BUSY != 0 {
            PipelineState::Busy
        } else {
            PipelineState::Idle
        }
    }
}

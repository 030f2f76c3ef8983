//! Per-pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use serde::Serialize;

use super::state::DropReason;

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    accepted: AtomicU64,
    dropped_busy: AtomicU64,
    dropped_stopped: AtomicU64,
    results: AtomicU64,
    errors: AtomicU64,
    suppressed: AtomicU64,
    aborted: AtomicU64,
}

/// Point-in-time copy of the pipeline counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub submitted: u64,
    pub accepted: u64,
    pub dropped_busy: u64,
    pub dropped_stopped: u64,
    pub results: u64,
    pub errors: u64,
    /// Completions discarded because the pipeline was shut down
    pub suppressed: u64,
    /// Detections cancelled by a hard abort
    pub aborted: u64,
}

impl PipelineStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_busy + self.dropped_stopped
    }
}

#[derive(Default)]
pub(crate) struct StatsCell {
    counters: CachePadded<Counters>,
}

impl StatsCell {
    pub(crate) fn submitted(&self) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("argus_frames_submitted_total").increment(1);
    }

    pub(crate) fn accepted(&self) {
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Busy => &self.counters.dropped_busy,
            DropReason::Stopped => &self.counters.dropped_stopped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("argus_frames_dropped_total", "reason" => reason.as_str()).increment(1);
    }

    pub(crate) fn result(&self) {
        self.counters.results.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("argus_detections_total", "outcome" => "result").increment(1);
    }

    pub(crate) fn error(&self) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("argus_detections_total", "outcome" => "error").increment(1);
    }

    pub(crate) fn suppressed(&self) {
        self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("argus_detections_total", "outcome" => "suppressed").increment(1);
    }

    pub(crate) fn aborted(&self) {
        self.counters.aborted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("argus_detections_total", "outcome" => "aborted").increment(1);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            accepted: c.accepted.load(Ordering::Relaxed),
            dropped_busy: c.dropped_busy.load(Ordering::Relaxed),
            dropped_stopped: c.dropped_stopped.load(Ordering::Relaxed),
            results: c.results.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            suppressed: c.suppressed.load(Ordering::Relaxed),
            aborted: c.aborted.load(Ordering::Relaxed),
        }
    }
}

//! Single-stream detection pipeline
//!
//! Frames enter through [`Pipeline::submit`]. At most one detection runs at a
//! time; a frame submitted while another is in flight, or after shutdown, is
//! released immediately and never reaches the detector. Completions are handed
//! to a dedicated dispatcher task that owns the [`ResultSink`], so sink calls
//! for one pipeline never interleave.

mod sink;
mod state;
mod stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use flume::{Receiver, Sender};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::capture::FrameHandle;
use crate::detect::Detector;
use crate::{DetectError, Result};

pub use sink::ResultSink;
pub use state::{DropReason, PipelineState};
pub use stats::PipelineStats;

use state::StateCell;
use stats::StatsCell;

/// What happened to a submitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Frame is in flight; exactly one sink bracket follows unless the
    /// pipeline is shut down first
    Accepted,
    /// Frame was released without running detection
    Dropped(DropReason),
}

impl SubmitOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

/// State shared by the pipeline handle, detection tasks, and the dispatcher
struct Shared {
    state: StateCell,
    stats: StatsCell,
    idle: Notify,
    task: ArcSwapOption<AbortHandle>,
}

/// Owns the in-flight slot for one accepted frame.
///
/// Field order matters: the frame is released before the busy flag clears.
struct InFlight {
    frame: FrameHandle,
    slot: BusySlot,
}

struct BusySlot {
    shared: Arc<Shared>,
    dispatched: bool,
}

impl Drop for BusySlot {
    fn drop(&mut self) {
        if !self.dispatched {
            self.shared.stats.aborted();
            debug!("Detection ended before dispatch");
        }
        self.shared.task.store(None);
        self.shared.state.finish();
        self.shared.idle.notify_waiters();
    }
}

struct Completion<T> {
    in_flight: InFlight,
    outcome: std::result::Result<T, DetectError>,
    elapsed: Duration,
}

pub struct Pipeline<D: Detector> {
    detector: Arc<D>,
    shared: Arc<Shared>,
    completions: Sender<Completion<D::Output>>,
    runtime: Handle,
}

impl<D: Detector> Pipeline<D> {
    /// Bind a pipeline to the current tokio runtime
    pub fn new<S>(detector: D, sink: S) -> Result<Self>
    where
        S: ResultSink<D::Output>,
    {
        Ok(Self::with_handle(Handle::try_current()?, detector, sink))
    }

    /// Bind a pipeline to an explicit runtime.
    ///
    /// `submit` may then be called from threads outside the runtime, such as
    /// a camera driver's callback thread.
    pub fn with_handle<S>(runtime: Handle, detector: D, sink: S) -> Self
    where
        S: ResultSink<D::Output>,
    {
        let shared = Arc::new(Shared {
            state: StateCell::default(),
            stats: StatsCell::default(),
            idle: Notify::new(),
            task: ArcSwapOption::empty(),
        });

        // Only one frame is ever in flight, so one slot is enough
        let (tx, rx) = flume::bounded(1);
        runtime.spawn(dispatch(rx, sink, shared.clone()));

        info!(detector = detector.name(), "Pipeline started");

        Self {
            detector: Arc::new(detector),
            shared,
            completions: tx,
            runtime,
        }
    }

    /// Hand a frame to the pipeline.
    ///
    /// Never blocks. The frame is released exactly once whatever the outcome:
    /// immediately when dropped, after the sink bracket when accepted.
    pub fn submit(&self, frame: FrameHandle) -> SubmitOutcome {
        let sequence = frame.sequence();
        self.shared.stats.submitted();

        if self.completions.is_disconnected() && self.shared.state.stop(false) {
            warn!("Pipeline dispatcher is gone, stopping pipeline");
        }

        if let Err(reason) = self.shared.state.try_begin() {
            self.shared.stats.dropped(reason);
            debug!(sequence, reason = reason.as_str(), "Dropping frame");
            frame.release();
            return SubmitOutcome::Dropped(reason);
        }

        self.shared.stats.accepted();
        trace!(sequence, "Frame accepted");

        let in_flight = InFlight {
            frame,
            slot: BusySlot {
                shared: self.shared.clone(),
                dispatched: false,
            },
        };
        let detector = self.detector.clone();
        let completions = self.completions.clone();
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let task = self.runtime.spawn(async move {
            // Hold off until the abort handle for this task is published
            let _ = armed_rx.await;
            if in_flight.slot.shared.state.is_aborted() {
                return;
            }

            let started = Instant::now();
            let outcome = detector.detect(in_flight.frame.frame()).await;
            let completion = Completion {
                in_flight,
                outcome,
                elapsed: started.elapsed(),
            };
            if let Err(flume::SendError(completion)) = completions.send_async(completion).await {
                // The completion drops here and releases its frame
                let shared = &completion.in_flight.slot.shared;
                if shared.state.stop(false) {
                    warn!(sequence, "Dispatcher unavailable, stopping pipeline");
                }
            }
        });

        self.shared.task.store(Some(Arc::new(task.abort_handle())));
        let _ = armed_tx.send(());

        SubmitOutcome::Accepted
    }

    /// Stop accepting frames.
    ///
    /// Idempotent and non-blocking. A detection already in flight runs to
    /// completion, but its result is discarded and no sink method is called
    /// for it; its frame is still released.
    pub fn shutdown(&self) {
        if self.shared.state.stop(false) {
            info!(in_flight = self.shared.state.is_busy(), "Pipeline shutting down");
        } else {
            debug!("Pipeline already shut down");
        }
    }

    /// Shut down and cancel the in-flight detection, if any.
    ///
    /// The detection future is dropped, which releases its frame. No sink
    /// method is called for it.
    pub fn abort(&self) {
        let first = self.shared.state.stop(true);
        if let Some(task) = self.shared.task.load_full() {
            task.abort();
            info!(first, "Pipeline aborted in-flight detection");
        } else if first {
            info!("Pipeline aborted while idle");
        }
    }

    /// Wait until no detection is in flight
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.shared.state.is_busy() {
                return;
            }
            notified.await;
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.is_running()
    }

    /// True while a detection is outstanding, including one draining after
    /// shutdown
    pub fn in_flight(&self) -> bool {
        self.shared.state.is_busy()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.stats.snapshot()
    }
}

impl<D: Detector> Drop for Pipeline<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Dispatcher loop: the pipeline's designated execution context.
///
/// Exits once the pipeline and every detection task have dropped their
/// senders.
async fn dispatch<T, S>(rx: Receiver<Completion<T>>, mut sink: S, shared: Arc<Shared>)
where
    S: ResultSink<T>,
{
    while let Ok(completion) = rx.recv_async().await {
        deliver(&mut sink, &shared, completion);
    }
    debug!("Pipeline dispatcher finished");
}

fn deliver<T, S>(sink: &mut S, shared: &Shared, completion: Completion<T>)
where
    S: ResultSink<T>,
{
    let Completion {
        mut in_flight,
        outcome,
        elapsed,
    } = completion;
    in_flight.slot.dispatched = true;
    let sequence = in_flight.frame.sequence();

    metrics::histogram!("argus_detect_seconds").record(elapsed.as_secs_f64());
    metrics::histogram!("argus_frame_latency_seconds")
        .record(in_flight.frame.timestamp.elapsed().as_secs_f64());

    // The running check happens once, so a frame's bracket is delivered whole
    // or not at all
    if shared.state.is_running() {
        sink.begin_frame();
        match outcome {
            Ok(result) => {
                shared.stats.result();
                trace!(sequence, elapsed_ms = elapsed.as_millis() as u64, "Delivering result");
                sink.on_result(result);
            }
            Err(error) => {
                shared.stats.error();
                warn!(sequence, kind = error.kind(), %error, "Detection failed");
                sink.on_error(error);
            }
        }
        sink.end_frame();
    } else {
        shared.stats.suppressed();
        debug!(sequence, "Pipeline stopped, suppressing completion");
    }

    drop(in_flight);
}

//! Shared harness for pipeline integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argus::capture::{
    Frame, FrameHandle, FrameMetadata, FrameRecycler, PixelFormat, Rotation,
};
use argus::detect::Detector;
use argus::pipeline::ResultSink;
use argus::DetectError;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Everything observable from outside the pipeline, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Begin,
    Result(Vec<u32>),
    Error(String),
    End,
    Released(u64),
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn sink_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Released(_)))
            .collect()
    }

    pub fn releases_of(&self, sequence: u64) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == Event::Released(sequence))
            .count()
    }

    /// Poll until `n` events are recorded
    pub async fn wait_for_len(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.events().len() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} events, have {:?}",
                self.events()
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

/// Records sink calls into the journal
pub struct RecordingSink(pub Journal);

impl ResultSink<Vec<u32>> for RecordingSink {
    fn begin_frame(&mut self) {
        self.0.push(Event::Begin);
    }

    fn on_result(&mut self, result: Vec<u32>) {
        self.0.push(Event::Result(result));
    }

    fn on_error(&mut self, error: DetectError) {
        self.0.push(Event::Error(error.to_string()));
    }

    fn end_frame(&mut self) {
        self.0.push(Event::End);
    }
}

/// Records frame releases into the journal
pub struct RecordingRecycler(pub Journal);

impl FrameRecycler for RecordingRecycler {
    fn recycle(&self, frame: &Frame) {
        self.0.push(Event::Released(frame.meta.sequence));
    }
}

pub fn metadata(sequence: u64, rotation: Rotation) -> FrameMetadata {
    FrameMetadata {
        sequence,
        width: 640,
        height: 480,
        stride: 640 * 3,
        format: PixelFormat::Rgb24,
        rotation,
    }
}

pub fn handle(journal: &Journal, sequence: u64) -> FrameHandle {
    handle_with(journal, metadata(sequence, Rotation::Deg0))
}

pub fn handle_with(journal: &Journal, meta: FrameMetadata) -> FrameHandle {
    let recycler: Arc<dyn FrameRecycler> = Arc::new(RecordingRecycler(journal.clone()));
    FrameHandle::new(Frame::new(Bytes::new(), meta), recycler)
}

/// One outstanding `detect` call, resolved by the test
pub struct Pending {
    pub sequence: u64,
    respond: oneshot::Sender<Result<Vec<u32>, DetectError>>,
}

impl Pending {
    pub fn resolve(self, result: Vec<u32>) {
        let _ = self.respond.send(Ok(result));
    }

    pub fn reject(self, error: DetectError) {
        let _ = self.respond.send(Err(error));
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Detector whose calls stay pending until the test resolves them
pub struct ControlledDetector {
    calls: mpsc::UnboundedSender<Pending>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    invocations: Arc<AtomicUsize>,
}

pub struct Calls {
    calls: mpsc::UnboundedReceiver<Pending>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    invocations: Arc<AtomicUsize>,
}

pub fn controlled() -> (ControlledDetector, Calls) {
    let (tx, rx) = mpsc::unbounded_channel();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let invocations = Arc::new(AtomicUsize::new(0));
    (
        ControlledDetector {
            calls: tx,
            active: active.clone(),
            max_active: max_active.clone(),
            invocations: invocations.clone(),
        },
        Calls {
            calls: rx,
            active,
            max_active,
            invocations,
        },
    )
}

#[async_trait]
impl Detector for ControlledDetector {
    type Output = Vec<u32>;

    fn name(&self) -> &'static str {
        "controlled"
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<u32>, DetectError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = ActiveGuard(self.active.clone());
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        let _ = self.calls.send(Pending {
            sequence: frame.meta.sequence,
            respond: tx,
        });
        rx.await
            .unwrap_or_else(|_| Err(DetectError::Failed("responder dropped".into())))
    }
}

impl Calls {
    pub async fn next_call(&mut self) -> Pending {
        tokio::time::timeout(Duration::from_secs(2), self.calls.recv())
            .await
            .expect("detector was not invoked")
            .expect("detector dropped")
    }

    /// Let spawned tasks run, then confirm no further detect call arrived
    pub async fn assert_no_call(&mut self) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(self.calls.try_recv().is_err(), "unexpected detect call");
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

//! Argus detection pipeline demo: synthetic camera -> luma detector -> overlay

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use argus::capture::{SourceAdapter, SyntheticCapture};
use argus::detect::{Detection, Detector, LumaDetector, TimeoutDetector};
use argus::display::{Overlay, OverlaySink};
use argus::pipeline::Pipeline;
use argus::{Config, Error, ShutdownMode};
use color_eyre::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("argus=debug")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Argus launching...");

    // Load configuration
    let config_path = std::env::var_os("ARGUS_CONFIG").map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    argus::CONFIG.store(Arc::new(config.clone()));

    let detector = LumaDetector::new(config.detector.clone());
    match config.pipeline.detect_timeout() {
        Some(timeout) => run(&config, TimeoutDetector::new(detector, timeout)).await,
        None => run(&config, detector).await,
    }
}

async fn run<D>(config: &Config, detector: D) -> Result<()>
where
    D: Detector<Output = Vec<Detection>>,
{
    let overlay: Arc<Overlay<Detection>> = Arc::new(Overlay::new());
    let pipeline = Arc::new(Pipeline::new(detector, OverlaySink::new(overlay.clone()))?);
    let mut adapter = SourceAdapter::new(pipeline.clone(), overlay.clone(), config.capture.mirrored);
    let mut capture = SyntheticCapture::new(config.capture.clone())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
            captured = capture.capture_frame() => match captured {
                Ok(frame) => {
                    if let Err(e) = adapter.on_frame(frame) {
                        error!("Failed to submit frame: {}", e);
                    }
                }
                Err(Error::PoolExhausted { capacity }) => {
                    warn!(capacity, "All capture buffers in use, skipping frame");
                }
                Err(e) => {
                    error!("Capture error: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }

    match config.pipeline.shutdown_mode {
        ShutdownMode::Cooperative => pipeline.shutdown(),
        ShutdownMode::Abort => pipeline.abort(),
    }

    let drain = config.pipeline.drain_timeout();
    if tokio::time::timeout(drain, pipeline.wait_idle()).await.is_err() {
        warn!(
            drain_ms = drain.as_millis() as u64,
            "Detection still in flight after drain timeout"
        );
    }

    let stats = pipeline.stats();
    let scene = overlay.scene();
    info!(
        submitted = stats.submitted,
        accepted = stats.accepted,
        dropped = stats.dropped(),
        results = stats.results,
        errors = stats.errors,
        suppressed = stats.suppressed,
        last_scene_items = scene.items.len(),
        buffers_outstanding = capture.pool().outstanding(),
        "Argus shutting down"
    );
    Ok(())
}

pub mod capture;
pub mod detect;
pub mod display;
pub mod error;
pub mod pipeline;

use std::path::Path;
use std::time::Duration;

use arc_swap::ArcSwap;
use capture::frame::{PixelFormat, Rotation};
use serde::{Deserialize, Serialize};

pub use error::{BoxError, DetectError, Error, Result};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Environment variable prefix for overrides, e.g. `ARGUS_PIPELINE__DETECT_TIMEOUT_MS`
pub const ENV_PREFIX: &str = "ARGUS";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub pipeline: PipelineConfig,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
    /// Degrees clockwise, one of 0/90/180/270
    pub rotation: Rotation,
    /// Front-facing lens: the overlay mirrors horizontally
    pub mirrored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Let the in-flight detection finish and discard its result
    Cooperative,
    /// Cancel the in-flight detection
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-detection deadline; 0 disables it
    pub detect_timeout_ms: u64,
    pub shutdown_mode: ShutdownMode,
    /// How long teardown waits for an in-flight detection
    pub drain_timeout_ms: u64,
}

impl PipelineConfig {
    pub fn detect_timeout(&self) -> Option<Duration> {
        (self.detect_timeout_ms > 0).then(|| Duration::from_millis(self.detect_timeout_ms))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum luma (0-255) for a pixel to count as bright
    pub threshold: u8,
    /// Minimum bright pixel count for a detection
    pub min_area: u32,
    pub label: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            format: PixelFormat::Rgb24,
            buffer_count: 4,
            rotation: Rotation::Deg0,
            mirrored: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detect_timeout_ms: 500,
            shutdown_mode: ShutdownMode::Cooperative,
            drain_timeout_ms: 1_000,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 200,
            min_area: 9,
            label: "bright".into(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then an optional TOML file, then
    /// `ARGUS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if capture.width == 0 || capture.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "capture size {}x{} must be positive",
                capture.width, capture.height
            )));
        }
        if capture.fps == 0 {
            return Err(Error::InvalidConfig("capture fps must be positive".into()));
        }
        if capture.buffer_count == 0 {
            return Err(Error::InvalidConfig(
                "capture needs at least one buffer".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.pipeline.detect_timeout(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let pipeline = PipelineConfig {
            detect_timeout_ms: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(pipeline.detect_timeout(), None);
    }

    #[test]
    fn validation_rejects_empty_capture() {
        let mut config = Config::default();
        config.capture.buffer_count = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        config.capture.buffer_count = 2;
        config.capture.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rotation_parses_from_degrees() {
        let parsed: Rotation = ::config::Config::builder()
            .set_override("rotation", 270)
            .unwrap()
            .build()
            .unwrap()
            .get("rotation")
            .unwrap();
        assert_eq!(parsed, Rotation::Deg270);
    }

    #[test]
    fn environment_overrides_nested_keys() {
        std::env::set_var("ARGUS_PIPELINE__DETECT_TIMEOUT_MS", "1234");
        let loaded = Config::load(None);
        std::env::remove_var("ARGUS_PIPELINE__DETECT_TIMEOUT_MS");

        let config = loaded.unwrap();
        assert_eq!(config.pipeline.detect_timeout_ms, 1234);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.capture, CaptureConfig::default());
        assert_eq!(config.pipeline.shutdown_mode, ShutdownMode::Cooperative);
    }
}

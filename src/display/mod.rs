pub mod overlay;

pub use overlay::{ImageSourceInfo, Overlay, OverlaySink, Scene};

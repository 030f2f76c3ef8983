pub mod frame;
pub mod pool;
pub mod source;
pub mod synthetic;

pub use frame::{Frame, FrameHandle, FrameMetadata, FrameRecycler, PixelFormat, Rotation};
pub use pool::BufferPool;
pub use source::SourceAdapter;
pub use synthetic::SyntheticCapture;

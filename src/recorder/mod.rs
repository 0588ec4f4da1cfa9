pub mod chunk;

pub use chunk::{ChunkRecorder, RecorderState, Segment};

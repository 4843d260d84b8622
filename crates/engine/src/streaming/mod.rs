//! Scene chunk streaming and the per-scene open-range bookkeeping the rewind
//! engine relies on.

mod loader;
mod streamer;

pub use loader::{SceneBook, SceneLoader, SceneRecord};
pub use streamer::{ChunkStreamer, SceneEvent, SceneStreaming};

//! Media capability seams and frame value types.
//!
//! The queue filler never touches a codec directly. Everything it needs from
//! the demux/decode layer is expressed here as traits ([`MediaEngine`],
//! [`MediaContainer`], [`ContentPreparer`], [`FrameSink`]) plus the value
//! types that cross those seams.

pub mod engine;
pub mod sink;
pub mod types;

pub use engine::{ContentPreparer, FileUriPreparer, MediaContainer, MediaEngine, PassthroughPreparer};
pub use sink::FrameSink;
pub use types::{AudioChunk, AudioFrame, Packet, StreamInfo, StreamKind, TimeBase, VideoFrame};

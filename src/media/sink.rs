//! Consumer-supplied frame sink.

use crate::media::types::{AudioFrame, StreamInfo, VideoFrame};

/// Bounded queue interface that receives decoded frames.
///
/// The filler's worker thread calls `publish_*` and blocks while the sink is
/// full; `clear` must therefore be non-blocking and callable from any thread,
/// otherwise a seek against a full sink of stale frames would deadlock.
pub trait FrameSink: Send + Sync {
    /// Notification that a stream was discovered during open.
    fn announce_stream(&self, info: &StreamInfo);

    /// Queue a decoded video picture, blocking until there is room.
    fn publish_video(&self, frame: VideoFrame);

    /// Queue a decoded audio frame, blocking until there is room.
    fn publish_audio(&self, frame: AudioFrame);

    /// Discard all buffered frames and wake blocked publishers.
    fn clear(&self);

    /// Notification that playback reached end of stream. Idempotent.
    fn finish(&self);
}

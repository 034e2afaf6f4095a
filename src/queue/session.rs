//! Worker-owned decode session.

use crate::media::{MediaContainer, StreamInfo};

/// Everything the worker thread owns for one open container: the container
/// handle plus the first video and first audio stream it selected.
///
/// Exactly one session is live per worker run. Dropping it releases the
/// decoders and the container through the engine's RAII, which is how the
/// fatal-error path and the normal Closing path share one release point.
pub struct Session {
    pub container: Box<dyn MediaContainer>,
    pub video: Option<StreamInfo>,
    pub audio: Option<StreamInfo>,
}

impl Session {
    pub fn video_index(&self) -> Option<usize> {
        self.video.as_ref().map(|s| s.index)
    }

    pub fn audio_index(&self) -> Option<usize> {
        self.audio.as_ref().map(|s| s.index)
    }

    /// Stream whose index and time base anchor keyframe seeks: the audio
    /// stream when present, otherwise the video stream.
    pub fn seek_stream(&self) -> Option<&StreamInfo> {
        self.audio.as_ref().or(self.video.as_ref())
    }
}

//! Demux/decode capability traits and content-preparation strategies.
//!
//! The engine owns everything codec-related: opening containers, enumerating
//! streams, decoding packets and performing keyframe seeks. The queue filler
//! drives it serially from a single worker thread, so implementations do not
//! need internal synchronization, only `Send`.

use crate::error::MediaError;
use crate::media::types::{AudioChunk, Packet, StreamInfo, VideoFrame};

/// Factory for media containers.
pub trait MediaEngine: Send + Sync {
    /// Open the container behind `uri`.
    fn open(&self, uri: &str) -> Result<Box<dyn MediaContainer>, MediaError>;
}

/// One opened media container with its per-stream decoders.
///
/// All calls happen on the filler's worker thread. Dropping the container
/// releases every decoder and the container handle; implementations are
/// expected to be RAII so the fatal-error path cleans up the same way the
/// normal path does.
pub trait MediaContainer: Send {
    /// Number of streams discovered in the container.
    fn stream_count(&self) -> usize;

    /// Descriptor for the stream at `index`, if the codec is recognized.
    fn stream_info(&self, index: usize) -> Option<StreamInfo>;

    /// Open the decoder for the stream at `index`.
    fn open_decoder(&mut self, index: usize) -> Result<(), MediaError>;

    /// Read the next packet. `Ok(None)` signals end of stream.
    ///
    /// May block on container I/O; the filler only observes cancellation
    /// once the call returns.
    fn read_next_packet(&mut self) -> Result<Option<Packet>, MediaError>;

    /// Decode a video packet into a picture. The picture may be incomplete
    /// when the decoder is still buffering.
    fn decode_video(&mut self, stream_index: usize, packet: &Packet)
    -> Result<VideoFrame, MediaError>;

    /// Decode audio samples starting at `offset` bytes into the packet.
    ///
    /// Returns the produced chunk (if any) and the number of bytes consumed.
    /// The filler keeps calling with increasing offsets until the packet is
    /// drained.
    fn decode_audio(
        &mut self,
        stream_index: usize,
        packet: &Packet,
        offset: usize,
    ) -> Result<(Option<AudioChunk>, usize), MediaError>;

    /// Seek to the keyframe nearest `target` within `[min, max]`, all in
    /// ticks of the stream's time base. `backward` biases the landing
    /// keyframe to not-after the target.
    fn seek_keyframe(
        &mut self,
        stream_index: usize,
        min: i64,
        target: i64,
        max: i64,
        backward: bool,
    ) -> Result<(), MediaError>;

    /// Container duration in microseconds, `None` when unknown (streaming
    /// sources).
    fn duration_micros(&self) -> Option<i64>;
}

/// Resolves a URI before it is handed to the engine.
///
/// This is the hook for content acquisition (download, cache lookup) and for
/// platform quirks in URI handling. Preparation is untimed: it runs on the
/// controller thread before the worker starts.
pub trait ContentPreparer: Send + Sync {
    fn prepare(&self, uri: &str) -> Result<String, MediaError>;
}

/// Default preparer: hands the URI through unchanged.
pub struct PassthroughPreparer;

impl ContentPreparer for PassthroughPreparer {
    fn prepare(&self, uri: &str) -> Result<String, MediaError> {
        Ok(uri.to_string())
    }
}

/// Preparer that rewrites `file:` URIs into plain filesystem paths.
///
/// Some demuxers fail to open `file:` URLs directly (notably on Windows),
/// so this strategy strips the scheme and normalizes the drive prefix.
/// Non-file URIs pass through unchanged.
pub struct FileUriPreparer;

impl ContentPreparer for FileUriPreparer {
    fn prepare(&self, uri: &str) -> Result<String, MediaError> {
        let Some(rest) = uri.strip_prefix("file://").or_else(|| uri.strip_prefix("file:")) else {
            return Ok(uri.to_string());
        };

        // "file:///C:/media/a.mp4" keeps a leading slash before the drive
        // letter that the filesystem does not want
        let path = match rest.as_bytes() {
            [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() => &rest[1..],
            _ => rest,
        };

        if path.is_empty() {
            return Err(MediaError::Open(format!("could not parse URI: {uri}")));
        }

        Ok(path.to_string())
    }
}

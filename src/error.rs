//! Error type shared across the capability seams.

use thiserror::Error;

/// Errors produced by media capabilities and content preparation.
///
/// Open and decode errors are fatal for the running session: the worker
/// terminates and the controller observes the media as never loaded. Seek
/// errors are recoverable, they only disable seeking for the session.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Content preparation or container I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The container could not be opened.
    #[error("could not open media: {0}")]
    Open(String),

    /// A decoder could not be opened or a packet could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A keyframe seek was rejected by the container.
    #[error("seek error: {0}")]
    Seek(String),
}

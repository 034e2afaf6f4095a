//! Bounded playback-queue filler for real-time media clients.
//!
//! This crate provides a unified engine for feeding decoded media frames
//! into a consumer-owned playback queue, separating concerns between:
//! - Control/Coordination: worker lifecycle, open/close timeouts, cancellation
//! - Demux/Decode: an injected [`MediaEngine`] capability that owns the codec
//! - Seeking: a convergent seek state machine for A/V synchronization
//! - Delivery: a consumer-supplied [`FrameSink`] with backpressure
//!
//! # Architecture
//!
//! A [`QueueFiller`] owns one background worker thread at a time. The worker
//! opens a container through the engine, discovers the first video and first
//! audio stream, then loops: read packet, decode, check seek convergence,
//! publish to the sink. Controller calls (`open`, `seek`, `disable`) and the
//! worker coordinate through a single monitor (mutex + condvar), so every
//! timeout is a timed wait and shutdown is cooperative, checked at each loop
//! iteration boundary.
//!
//! [`MediaEngine`]: crate::media::MediaEngine
//! [`FrameSink`]: crate::media::FrameSink
//! [`QueueFiller`]: crate::queue::QueueFiller

pub mod error;
pub mod media;
pub mod queue;

pub use error::MediaError;
pub use media::{
    AudioChunk, AudioFrame, ContentPreparer, FileUriPreparer, FrameSink, MediaContainer,
    MediaEngine, Packet, PassthroughPreparer, StreamInfo, StreamKind, TimeBase, VideoFrame,
};
pub use queue::{QueueFiller, QueueFillerConfig, SeekState};

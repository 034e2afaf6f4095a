//! Core value types crossing the decode and sink seams.

use bytes::Bytes;

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Rational stream time base (`num/den` seconds per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const MICROSECONDS: TimeBase = TimeBase {
        num: 1,
        den: 1_000_000,
    };

    pub fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Rescale a microsecond value into ticks of this time base.
    pub fn ticks_from_micros(&self, micros: i64) -> i64 {
        if self.num == 0 || self.den == 0 {
            return micros;
        }
        let ticks = micros as i128 * self.den as i128 / (self.num as i128 * 1_000_000);
        ticks as i64
    }

    /// Convert a tick count of this time base into microseconds.
    pub fn ticks_to_micros(&self, ticks: i64) -> i64 {
        if self.den == 0 {
            return ticks;
        }
        let micros = ticks as i128 * self.num as i128 * 1_000_000 / self.den as i128;
        micros as i64
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Video => write!(f, "Video"),
            StreamKind::Audio => write!(f, "Audio"),
        }
    }
}

/// Descriptor of one container stream, as discovered during open.
///
/// The filler selects the first video and the first audio stream in
/// enumeration order; all other streams are ignored.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream index within the container.
    pub index: usize,
    pub kind: StreamKind,
    /// Picture width (video only).
    pub width: Option<u32>,
    /// Picture height (video only).
    pub height: Option<u32>,
    /// Sample rate in Hz (audio only).
    pub sample_rate: Option<u32>,
    /// Channel count (audio only).
    pub channels: Option<u16>,
    /// Time base used by seek bounds on this stream.
    pub time_base: TimeBase,
}

/// One demuxed packet, not yet decoded.
#[derive(Debug, Clone)]
pub struct Packet {
    pub stream_index: usize,
    pub data: Bytes,
}

impl Packet {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A decoded video picture with presentation timestamp.
///
/// Decoders may consume a packet without producing a full picture yet, in
/// which case `complete` is false and the frame must not be published.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Presentation timestamp in microseconds.
    pub pts_micros: i64,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    pub complete: bool,
}

impl VideoFrame {
    pub fn pts_seconds(&self) -> f64 {
        self.pts_micros as f64 / MICROS_PER_SEC
    }
}

/// One set of decoded audio samples from a single decode call.
///
/// A packet can carry several sample sets, so the filler calls the decoder
/// repeatedly at increasing offsets and accumulates the complete chunks.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Presentation timestamp in microseconds.
    pub pts_micros: i64,
    pub data: Bytes,
    pub complete: bool,
}

impl AudioChunk {
    pub fn pts_seconds(&self) -> f64 {
        self.pts_micros as f64 / MICROS_PER_SEC
    }
}

/// A published audio frame: all complete sample chunks of one packet,
/// concatenated, stamped with the first chunk's timestamp.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pts_micros: i64,
    data: Bytes,
}

impl AudioFrame {
    pub fn new(pts_micros: i64, data: Bytes) -> Self {
        Self { pts_micros, data }
    }

    pub fn pts_micros(&self) -> i64 {
        self.pts_micros
    }

    pub fn pts_seconds(&self) -> f64 {
        self.pts_micros as f64 / MICROS_PER_SEC
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of valid sample bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

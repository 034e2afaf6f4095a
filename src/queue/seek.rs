//! Convergence tracking for an in-flight seek.

use log::debug;

use crate::media::StreamKind;

/// Acceptance window around the seek target, in seconds.
///
/// Empirical: wide enough to catch the frame nearest the target on common
/// frame rates, narrow enough not to accept a frame from the previous
/// keyframe group. TODO: derive from the video stream's frame rate.
pub const SEEK_TOLERANCE_SECS: f64 = 0.05;

/// Tracks one seek request until both streams have converged on the target.
///
/// A fresh `SeekState` is installed for every seek request; a later request
/// replaces an unfinished one, so the worker carries the `id` of the state it
/// snapshotted and re-checks it before mutating. Once both streams are found
/// the state is retired (the shared reference becomes `None`).
#[derive(Debug, Clone)]
pub struct SeekState {
    id: u64,
    target: f64,
    performed: bool,
    seeking_video: bool,
    seeking_audio: bool,
    skip_video: u32,
    skip_audio: u32,
}

impl SeekState {
    /// Streams absent from the container count as found from the start, so
    /// audio-only and video-only media can still converge.
    pub fn new(id: u64, target: f64, has_video: bool, has_audio: bool) -> Self {
        Self {
            id,
            target,
            performed: false,
            seeking_video: has_video,
            seeking_audio: has_audio,
            skip_video: 0,
            skip_audio: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Target time in seconds.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Whether the keyframe seek call has been issued for this state.
    pub fn performed(&self) -> bool {
        self.performed
    }

    pub fn set_performed(&mut self) {
        self.performed = true;
    }

    /// Stop tracking convergence entirely (used when the underlying seek
    /// call fails and the stream position is whatever it is).
    pub fn abandon(&mut self) {
        self.seeking_video = false;
        self.seeking_audio = false;
    }

    /// True once both streams have found their post-seek frame.
    pub fn converged(&self) -> bool {
        !self.seeking_video && !self.seeking_audio
    }

    pub fn skip_count(&self, kind: StreamKind) -> u32 {
        match kind {
            StreamKind::Video => self.skip_video,
            StreamKind::Audio => self.skip_audio,
        }
    }

    /// Judge a decoded unit at `pts_seconds` against the target.
    ///
    /// Returns true when the unit is acceptable for publishing: either this
    /// stream already converged earlier, or this unit is the converged frame.
    /// Returns false when the unit should be discarded as pre-seek noise.
    ///
    /// A unit is the converged frame when it lands within
    /// [`SEEK_TOLERANCE_SECS`] of the target, or when it is past the target
    /// and at least one earlier unit was already skipped. The second rule
    /// covers decoder buffering: sometimes the first unit after a seek is a
    /// stale one from before the jump, and the first in-window frame simply
    /// does not exist.
    pub fn check(&mut self, kind: StreamKind, pts_seconds: f64) -> bool {
        let seeking = match kind {
            StreamKind::Video => self.seeking_video,
            StreamKind::Audio => self.seeking_audio,
        };
        if !seeking {
            return true;
        }

        let diff = self.target - pts_seconds;
        debug!("{kind} {pts_seconds:.3} seeking for {:.3} diff {diff:.3}", self.target);

        let skipped = self.skip_count(kind) > 0;
        if diff.abs() < SEEK_TOLERANCE_SECS || (diff < 0.0 && skipped) {
            match kind {
                StreamKind::Video => self.seeking_video = false,
                StreamKind::Audio => self.seeking_audio = false,
            }
            true
        } else {
            match kind {
                StreamKind::Video => self.skip_video += 1,
                StreamKind::Audio => self.skip_audio += 1,
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seek_to(target: f64) -> SeekState {
        SeekState::new(1, target, true, true)
    }

    #[test]
    fn test_accepts_frame_within_tolerance() {
        let mut seek = seek_to(5.0);
        assert!(seek.check(StreamKind::Video, 5.02));
        assert!(!seek.converged());
        assert!(seek.check(StreamKind::Audio, 4.96));
        assert!(seek.converged());
    }

    #[test]
    fn test_rejects_early_frames_and_counts_skips() {
        let mut seek = seek_to(5.0);
        assert!(!seek.check(StreamKind::Video, 4.0));
        assert!(!seek.check(StreamKind::Video, 4.5));
        assert_eq!(seek.skip_count(StreamKind::Video), 2);
        assert!(!seek.converged());
    }

    #[test]
    fn test_late_frame_accepted_only_after_a_skip() {
        // A stale late frame arriving first is rejected
        let mut seek = seek_to(5.0);
        assert!(!seek.check(StreamKind::Video, 7.0));
        // The next late frame counts as the best available option
        assert!(seek.check(StreamKind::Video, 5.4));
    }

    #[test]
    fn test_streams_converge_independently() {
        let mut seek = seek_to(2.0);
        assert!(seek.check(StreamKind::Video, 2.0));
        // Video already found: pass-through, no skip bookkeeping
        assert!(seek.check(StreamKind::Video, 2.1));
        assert_eq!(seek.skip_count(StreamKind::Video), 0);
        assert!(!seek.converged());
        assert!(!seek.check(StreamKind::Audio, 1.0));
        assert!(seek.check(StreamKind::Audio, 2.04));
        assert!(seek.converged());
    }

    #[test]
    fn test_absent_streams_start_found() {
        let audio_only = SeekState::new(3, 1.0, false, true);
        assert!(!audio_only.converged());
        let mut seek = audio_only;
        assert!(seek.check(StreamKind::Audio, 1.01));
        assert!(seek.converged());

        let no_streams = SeekState::new(4, 0.0, false, false);
        assert!(no_streams.converged());
    }

    #[test]
    fn test_abandon_retires_both_streams() {
        let mut seek = seek_to(9.0);
        seek.abandon();
        assert!(seek.converged());
        // Abandoned streams pass everything through
        assert!(seek.check(StreamKind::Video, 0.0));
        assert!(seek.check(StreamKind::Audio, 123.0));
    }
}

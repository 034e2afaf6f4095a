//! The queue filler: worker lifecycle, fill loop and seek protocol.

use anyhow::{Context, Result, bail};
use bytes::BytesMut;
use log::{debug, error, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::media::{
    AudioFrame, ContentPreparer, FrameSink, MediaEngine, PassthroughPreparer, StreamKind,
};
use crate::queue::seek::SeekState;
use crate::queue::session::Session;

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_millis(60_000);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// How long `disable` sleeps between shutdown re-checks.
const SHUTDOWN_POLL: Duration = Duration::from_secs(1);

/// Per-instance configuration for [`QueueFiller`].
#[derive(Debug, Clone)]
pub struct QueueFillerConfig {
    /// How long `open` blocks waiting for the first packet.
    pub open_timeout: Duration,
    /// How long `disable` waits for the worker before abandoning it.
    pub close_timeout: Duration,
    /// URI schemes that are known not to support seeking; the probe seek is
    /// skipped for them and seeking stays disabled.
    pub no_seek_protocols: Vec<String>,
}

impl Default for QueueFillerConfig {
    fn default() -> Self {
        Self {
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            no_seek_protocols: vec!["rtmp".to_string()],
        }
    }
}

/// Cross-thread state, guarded by the monitor in [`Inner`].
struct SharedState {
    worker: Option<JoinHandle<()>>,
    /// True from worker spawn until its exit block has run.
    alive: bool,
    /// True once the first packet of the current session has been read.
    loaded: bool,
    /// Result of the probe seek; meaningless until `loaded`.
    can_seek: bool,
    /// Cooperative cancellation flag, polled at loop iteration boundaries.
    quit: bool,
    /// The in-flight seek, if any. Replaced wholesale on a new request.
    seek: Option<SeekState>,
    next_seek_id: u64,
    /// Prepared URI from the last successful `open` call.
    uri: Option<String>,
    duration_micros: Option<i64>,
    video_size: (u32, u32),
    has_video: bool,
    has_audio: bool,
}

struct Inner {
    state: Mutex<SharedState>,
    cond: Condvar,
    /// Serializes `open` calls end to end, so one caller's prepared URI
    /// cannot be raced away by another before its worker starts.
    open_gate: Mutex<()>,
    engine: Arc<dyn MediaEngine>,
    sink: Arc<dyn FrameSink>,
    preparer: Arc<dyn ContentPreparer>,
    config: QueueFillerConfig,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap()
    }

    fn quit_requested(&self) -> bool {
        self.lock().quit
    }
}

/// Fills a consumer-owned frame queue from a media container.
///
/// Owns at most one background worker thread at a time. The worker opens the
/// container through the injected [`MediaEngine`], announces the discovered
/// streams to the [`FrameSink`], then reads, decodes and publishes packets
/// until end of stream or cancellation.
pub struct QueueFiller {
    inner: Arc<Inner>,
}

impl QueueFiller {
    pub fn new(engine: Arc<dyn MediaEngine>, sink: Arc<dyn FrameSink>) -> Self {
        Self::with_parts(
            engine,
            sink,
            Arc::new(PassthroughPreparer),
            QueueFillerConfig::default(),
        )
    }

    pub fn with_config(
        engine: Arc<dyn MediaEngine>,
        sink: Arc<dyn FrameSink>,
        config: QueueFillerConfig,
    ) -> Self {
        Self::with_parts(engine, sink, Arc::new(PassthroughPreparer), config)
    }

    /// Full construction with an explicit [`ContentPreparer`] strategy.
    pub fn with_parts(
        engine: Arc<dyn MediaEngine>,
        sink: Arc<dyn FrameSink>,
        preparer: Arc<dyn ContentPreparer>,
        config: QueueFillerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SharedState {
                    worker: None,
                    alive: false,
                    loaded: false,
                    can_seek: false,
                    quit: false,
                    seek: None,
                    next_seek_id: 0,
                    uri: None,
                    duration_micros: None,
                    video_size: (0, 0),
                    has_video: false,
                    has_audio: false,
                }),
                cond: Condvar::new(),
                open_gate: Mutex::new(()),
                engine,
                sink,
                preparer,
                config,
            }),
        }
    }

    pub fn config(&self) -> &QueueFillerConfig {
        &self.inner.config
    }

    /// Open `uri` and block until the media is loaded or the open timeout
    /// elapses.
    ///
    /// Concurrent `open` calls are serialized; each one runs its
    /// stop-prepare-start-wait sequence whole. Any running worker is
    /// stopped first. Returns true iff streams were
    /// discovered and the first packet was read before the timeout; on
    /// timeout the worker is asked to stop (cooperatively, not forcibly) and
    /// false is returned. Timeout and genuine open failure are intentionally
    /// indistinguishable here: both simply never became loaded.
    pub fn open(&self, uri: &str) -> bool {
        let _gate = self.inner.open_gate.lock().unwrap();

        if self.is_running() {
            self.shutdown_worker();
        }

        let resolved = match self.inner.preparer.prepare(uri) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("error opening {uri}: {e}");
                return false;
            }
        };

        self.inner.lock().uri = Some(resolved);
        self.start();

        let deadline = Instant::now() + self.inner.config.open_timeout;
        let mut state = self.inner.lock();
        while state.alive && !state.loaded {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .inner
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }

        // Timed out with the worker still going: signal it to stop at its
        // next checkpoint, then report failure
        if !state.loaded && state.alive {
            state.quit = true;
            self.inner.cond.notify_all();
        }

        state.loaded
    }

    /// Start the worker with the previously prepared URI, without the
    /// open-timeout contract. Used to resume after `disable`.
    pub fn enable(&self) {
        if !self.is_running() {
            self.start();
        }
    }

    /// Request shutdown and wait, bounded by the close timeout.
    pub fn disable(&self) {
        self.shutdown_worker();
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().alive
    }

    /// Duration of the open media in seconds, or `None` when unknown: the
    /// container is not open, or the source is streaming with no known end.
    pub fn duration(&self) -> Option<f64> {
        self.inner
            .lock()
            .duration_micros
            .map(|micros| micros as f64 / 1_000_000.0)
    }

    /// Video picture dimensions, `(0, 0)` when no video stream is open.
    pub fn video_size(&self) -> (u32, u32) {
        self.inner.lock().video_size
    }

    /// Whether seeking is supported on the current content. Always false
    /// until the media is loaded.
    pub fn can_seek(&self) -> bool {
        let state = self.inner.lock();
        state.loaded && state.can_seek
    }

    /// Whether a seek is currently in flight.
    pub fn is_seeking(&self) -> bool {
        self.inner.lock().seek.is_some()
    }

    /// Seek to `target_secs`.
    ///
    /// Installs a fresh seek state, superseding any unfinished one, and
    /// clears the sink so the consumer does not keep playing stale frames
    /// while the seek resolves. A no-op (with a warning) when seeking is
    /// unsupported.
    pub fn seek(&self, target_secs: f64) {
        {
            let mut state = self.inner.lock();
            if !state.loaded || !state.can_seek {
                warn!("unable to seek");
                return;
            }

            let id = state.next_seek_id;
            state.next_seek_id += 1;
            state.seek = Some(SeekState::new(
                id,
                target_secs,
                state.has_video,
                state.has_audio,
            ));
        }

        debug!("seek to {target_secs}");
        self.inner.sink.clear();
    }

    fn start(&self) {
        let mut state = self.inner.lock();
        if state.alive {
            return;
        }
        // Reap the handle of a worker that already finished on its own
        if let Some(handle) = state.worker.take() {
            drop(state);
            let _ = handle.join();
            state = self.inner.lock();
            if state.alive {
                return;
            }
        }

        let Some(uri) = state.uri.clone() else {
            warn!("no media prepared; nothing to start");
            return;
        };

        state.quit = false;
        state.loaded = false;

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("frame-queue-filler".to_string())
            .spawn(move || worker_run(inner, uri));

        match spawned {
            Ok(handle) => {
                state.alive = true;
                state.worker = Some(handle);
            }
            Err(e) => error!("failed to spawn queue filler thread: {e}"),
        }
    }

    /// Signal the worker to quit and wait for it, re-logging once per second
    /// like a watchdog. If the close timeout elapses the handle is abandoned:
    /// a leaked thread is a reportable fault here, not a crash.
    fn shutdown_worker(&self) {
        let mut state = self.inner.lock();
        if !state.alive {
            if let Some(handle) = state.worker.take() {
                drop(state);
                let _ = handle.join();
            }
            return;
        }

        state.quit = true;
        self.inner.cond.notify_all();

        let deadline = Instant::now() + self.inner.config.close_timeout;
        while state.alive {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            debug!("waiting for queue filler to stop");
            let slice = SHUTDOWN_POLL.min(deadline - now);
            let (guard, _) = self.inner.cond.wait_timeout(state, slice).unwrap();
            state = guard;
        }

        if state.alive {
            warn!(
                "queue filler did not stop within {:?}; abandoning thread",
                self.inner.config.close_timeout
            );
            state.worker = None;
        } else if let Some(handle) = state.worker.take() {
            drop(state);
            let _ = handle.join();
        }
    }
}

impl Drop for QueueFiller {
    fn drop(&mut self) {
        self.shutdown_worker();
    }
}

/// Worker thread body: open, fill until done or cancelled, then close.
fn worker_run(inner: Arc<Inner>, uri: String) {
    debug!("queue filler opening {uri}");

    if let Err(e) = fill_media(&inner, &uri) {
        warn!("queue filler stopped: {e:#}");
    }

    // Closing: the session (and with it every decoder and container handle)
    // was already released by RAII when fill_media returned. Reset the shared
    // view of the media and wake anyone blocked in open() or disable().
    let mut state = inner.lock();
    debug!("queue filler exiting");
    state.loaded = false;
    state.duration_micros = None;
    state.video_size = (0, 0);
    state.has_video = false;
    state.has_audio = false;
    state.seek = None;
    state.alive = false;
    inner.cond.notify_all();
}

fn fill_media(inner: &Inner, uri: &str) -> Result<()> {
    let mut session = open_media(inner, uri).context("opening media")?;

    let mut finished = false;
    loop {
        if inner.quit_requested() {
            break;
        }
        if !fill_queue(inner, &mut session)? {
            finished = true;
            break;
        }
    }

    // A cancelled session never reports finished, even if the quit flag
    // arrived while the last packet was being read
    if finished && !inner.quit_requested() {
        inner.sink.finish();
    }

    Ok(())
}

/// Open the container, pick the first video and first audio stream, open
/// their decoders and announce them, then prime the probe seek.
fn open_media(inner: &Inner, uri: &str) -> Result<Session> {
    let mut container = inner.engine.open(uri)?;

    let stream_count = container.stream_count();
    debug!("opened container with {stream_count} streams");

    let mut video = None;
    let mut audio = None;
    for index in 0..stream_count {
        let Some(info) = container.stream_info(index) else {
            continue;
        };
        match info.kind {
            StreamKind::Video if video.is_none() => video = Some(info),
            StreamKind::Audio if audio.is_none() => audio = Some(info),
            _ => {}
        }
    }

    if video.is_none() && audio.is_none() {
        bail!("could not find audio or video stream in container: {uri}");
    }

    if let Some(info) = &video {
        container
            .open_decoder(info.index)
            .context("opening video decoder")?;
        debug!("opened video stream {}", info.index);
        inner.sink.announce_stream(info);
    }

    if let Some(info) = &audio {
        container
            .open_decoder(info.index)
            .context("opening audio decoder")?;
        debug!("opened audio stream {}", info.index);
        inner.sink.announce_stream(info);
    }

    let duration_micros = container.duration_micros();

    {
        let mut state = inner.lock();
        state.duration_micros = duration_micros;
        state.has_video = video.is_some();
        state.has_audio = audio.is_some();
        state.video_size = video
            .as_ref()
            .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
            .unwrap_or((0, 0));

        // Probe whether seeking works by seeking to the start of the media,
        // unless the protocol is known not to support it
        let lowered = uri.to_lowercase();
        let probe = !inner
            .config
            .no_seek_protocols
            .iter()
            .any(|protocol| lowered.starts_with(protocol.as_str()));
        if probe {
            let id = state.next_seek_id;
            state.next_seek_id += 1;
            state.seek = Some(SeekState::new(
                id,
                0.0,
                state.has_video,
                state.has_audio,
            ));
        }
    }

    Ok(Session {
        container,
        video,
        audio,
    })
}

/// One iteration of the fill loop. Returns false at end of stream.
fn fill_queue(inner: &Inner, session: &mut Session) -> Result<bool> {
    let (snapshot, loaded) = {
        let state = inner.lock();
        (
            state.seek.as_ref().map(|s| (s.id(), s.performed())),
            state.loaded,
        )
    };

    if let Some((seek_id, false)) = snapshot {
        perform_seek(inner, session, seek_id);
    }
    let seeking = snapshot.map(|(seek_id, _)| seek_id);

    let Some(packet) = session.container.read_next_packet()? else {
        return Ok(false);
    };

    // First packet read: the media is loaded, wake open() waiters
    if !loaded {
        let mut state = inner.lock();
        state.loaded = true;
        inner.cond.notify_all();
    }

    if session.video_index() == Some(packet.stream_index) {
        let picture = session
            .container
            .decode_video(packet.stream_index, &packet)
            .context("decoding video")?;

        let mut publish = picture.complete;
        if let Some(seek_id) = seeking {
            publish =
                publish && check_seek(inner, seek_id, StreamKind::Video, picture.pts_seconds());
        }

        if publish {
            debug!("publish picture at {:.3}", picture.pts_seconds());
            inner.sink.publish_video(picture);
        }
    } else if session.audio_index() == Some(packet.stream_index) {
        // A packet can carry several sample sets; drain them all into one
        // frame stamped with the first complete chunk's timestamp
        let mut data = BytesMut::new();
        let mut pts_micros = None;
        let mut offset = 0;

        while offset < packet.size() {
            let (chunk, consumed) = session
                .container
                .decode_audio(packet.stream_index, &packet, offset)
                .context("decoding audio")?;

            if let Some(chunk) = chunk {
                let mut keep = chunk.complete;
                if let Some(seek_id) = seeking {
                    keep = check_seek(inner, seek_id, StreamKind::Audio, chunk.pts_seconds())
                        && keep;
                }

                if keep {
                    if pts_micros.is_none() {
                        pts_micros = Some(chunk.pts_micros);
                    }
                    data.extend_from_slice(&chunk.data);
                }
            }

            // A decoder that stops consuming bytes will never drain this
            // packet; keep what it produced and drop the rest
            if consumed == 0 {
                break;
            }
            offset += consumed;
        }

        // No timestamp captured means everything was filtered while seeking;
        // there is no frame to publish for this packet
        if let Some(pts_micros) = pts_micros {
            let frame = AudioFrame::new(pts_micros, data.freeze());
            debug!("publish audio at {:.3}", frame.pts_seconds());
            inner.sink.publish_audio(frame);
        }
    }
    // Packets on other streams are dropped

    Ok(true)
}

/// Issue the keyframe seek for the current seek state, at most once per
/// state.
///
/// The seek is anchored on the audio stream (the video stream for audio-less
/// media): target and a 100 microsecond backward tolerance are rescaled to
/// that stream's time base. Failure permanently disables seeking for this
/// session and retires the seek state; playback continues unseeked.
fn perform_seek(inner: &Inner, session: &mut Session, seek_id: u64) {
    let target_secs = {
        let state = inner.lock();
        match &state.seek {
            Some(s) if s.id() == seek_id => s.target(),
            _ => return,
        }
    };

    let Some(stream) = session.seek_stream() else {
        return;
    };
    let stream_index = stream.index;
    let time_base = stream.time_base;

    let target_micros = (target_secs * 1_000_000.0) as i64;
    let min_micros = target_micros - 100;
    let target = time_base.ticks_from_micros(target_micros);
    let min = time_base.ticks_from_micros(min_micros);

    debug!("perform seek for {target_micros}us -> {target} in {time_base}");

    let result = session
        .container
        .seek_keyframe(stream_index, min, target, target, true);

    {
        let mut state = inner.lock();
        match result {
            Ok(()) => {
                state.can_seek = true;
                if let Some(s) = &mut state.seek
                    && s.id() == seek_id
                {
                    s.set_performed();
                }
            }
            Err(e) => {
                warn!("unable to seek: {e}");
                state.can_seek = false;
                // Convergence tracking is pointless now; retire the state
                if let Some(s) = &mut state.seek
                    && s.id() == seek_id
                {
                    s.abandon();
                    state.seek = None;
                }
            }
        }
    }

    // The sink was already cleared when the seek was requested, but frames
    // produced between the request and the actual seek call are stale too
    inner.sink.clear();
}

/// Run the convergence check for one decoded unit against the seek state the
/// worker snapshotted. Retires the state once both streams are found.
fn check_seek(inner: &Inner, seek_id: u64, kind: StreamKind, pts_seconds: f64) -> bool {
    let mut state = inner.lock();
    match &mut state.seek {
        // Retired already (seek failure path): everything passes
        None => true,
        Some(s) if s.id() == seek_id => {
            let complete = s.check(kind, pts_seconds);
            if s.converged() {
                state.seek = None;
            }
            complete
        }
        // Superseded by a newer request; judge this unit as pre-seek noise
        Some(_) => false,
    }
}

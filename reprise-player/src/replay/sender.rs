//! Replay sender - feeds a recorded packet log into a viewer.
//!
//! The sender runs in one of two modes:
//!
//! - **Async**: a timing thread delivers frames in real time, scaled by the
//!   playback speed. Jumps are made by hurrying (skipping the waits) until a
//!   frame past the target has been delivered.
//! - **Sync**: nothing moves on its own; [`ReplaySender::play_until`]
//!   delivers every frame up to a timestamp and returns.
//!
//! Going backwards in time always starts over from the first frame.
//!
//! All frame handling happens inside one engine lock, held for a whole
//! read-wait-deliver step. Control calls (pause, speed, jump) only touch
//! atomics and never wait for that lock, so they stay responsive while the
//! timing thread is sleeping towards the next frame.

use atomic_float::AtomicF64;
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use reprise_core::transform::{self, Pacing, TransformConfig, TransformState, Verdict, ViewerState};
use reprise_core::Message;

use crate::config::ReplayConfig;
use crate::error::ReplayError;

use super::host::{PacketSink, ReplayHost};
use super::packet_log::{Frame, PacketLogReader};
use super::resource_pack::ResourcePackCache;
use super::source::{PacketStream, ReplaySource};
use super::timing;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How frames are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Async,
    Sync,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Async => write!(f, "async"),
            Mode::Sync => write!(f, "sync"),
        }
    }
}

/// Playback state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Playing,
    Paused,
    Hurrying,
    Terminated,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderState::Playing => write!(f, "playing"),
            SenderState::Paused => write!(f, "paused"),
            SenderState::Hurrying => write!(f, "hurrying"),
            SenderState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Playback status information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStatus {
    pub state: String,
    pub mode: Mode,
    /// Current position in milliseconds
    pub timestamp_ms: u32,
    /// Total duration in milliseconds
    pub duration_ms: u32,
    /// Playback speed multiplier, 0 while paused
    pub speed: f64,
    /// Jump target while hurrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_timestamp_ms: Option<u32>,
    pub world_loaded: bool,
}

// =============================================================================
// Control flags
// =============================================================================

/// Flags shared between the control side and the timing thread
pub(crate) struct Control {
    async_mode: AtomicBool,
    /// Asks the current timing thread to exit (mode switch or termination)
    timing_stop: AtomicBool,
    terminated: AtomicBool,
    restart_requested: AtomicBool,
    paused: AtomicBool,
    world_loaded: AtomicBool,
    /// Last non-zero speed
    speed: AtomicF64,
    hurry_target: Mutex<Option<u32>>,
    last_timestamp: AtomicU32,
    /// Microseconds since `epoch` at which the last frame was sent
    last_sent_at: AtomicU64,
    epoch: Instant,
    pub(crate) poll_interval: Duration,
    pub(crate) pause_after_jump: bool,
    duration_ms: u32,
}

impl Control {
    fn new(config: &ReplayConfig, duration_ms: u32) -> Self {
        Self {
            async_mode: AtomicBool::new(false),
            timing_stop: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            world_loaded: AtomicBool::new(false),
            speed: AtomicF64::new(config.speed),
            hurry_target: Mutex::new(None),
            last_timestamp: AtomicU32::new(0),
            last_sent_at: AtomicU64::new(0),
            epoch: Instant::now(),
            poll_interval: config.poll_interval(),
            pause_after_jump: config.pause_after_jump,
            duration_ms,
        }
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    pub(crate) fn mark_sent(&self) {
        self.last_sent_at.store(self.now_us(), Ordering::SeqCst);
    }

    pub(crate) fn since_last_sent(&self) -> Duration {
        let last = self.last_sent_at.load(Ordering::SeqCst);
        Duration::from_micros(self.now_us().saturating_sub(last))
    }

    pub(crate) fn is_async(&self) -> bool {
        self.async_mode.load(Ordering::SeqCst)
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.terminated.load(Ordering::SeqCst) || self.timing_stop.load(Ordering::SeqCst)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::SeqCst);
        if was && !paused {
            // Resume without a burst of overdue frames
            self.mark_sent();
        }
    }

    pub(crate) fn speed(&self) -> f64 {
        self.speed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_world_loaded(&self) -> bool {
        self.world_loaded.load(Ordering::SeqCst)
    }

    pub(crate) fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn hurry_target(&self) -> Option<u32> {
        *lock(&self.hurry_target)
    }

    /// Clear the hurry target if it is still `target`
    pub(crate) fn finish_hurry(&self, target: u32) -> bool {
        let mut current = lock(&self.hurry_target);
        if *current == Some(target) {
            *current = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn last_timestamp(&self) -> u32 {
        self.last_timestamp.load(Ordering::SeqCst)
    }

    pub(crate) fn set_last_timestamp(&self, timestamp: u32) {
        self.last_timestamp.store(timestamp, Ordering::SeqCst);
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Everything a read-and-deliver step touches
pub(crate) struct Engine {
    source: Box<dyn ReplaySource>,
    reader: Option<PacketLogReader<PacketStream>>,
    /// Frame read but not delivered yet
    pending: Option<Frame>,
    state: TransformState,
    host: Box<dyn ReplayHost>,
    sink: Box<dyn PacketSink>,
    packs: ResourcePackCache,
    transform: TransformConfig,
    released: bool,
}

impl Engine {
    fn open(&mut self) -> Result<(), ReplayError> {
        self.reader = Some(PacketLogReader::new(self.source.open_packets()?));
        Ok(())
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    /// The pending frame, or the next one from the log. `None` at the end.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>, ReplayError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        match reader.next_frame() {
            Err(e) if e.is_end_of_log() => {
                // Nothing after a damaged frame can be trusted
                self.reader = None;
                Err(e)
            }
            result => result,
        }
    }

    /// Keep a frame for the next step
    pub(crate) fn hold(&mut self, frame: Frame) {
        self.pending = Some(frame);
    }

    /// Go back to the first frame of the log
    pub(crate) fn restart(&mut self, control: &Control) -> Result<(), ReplayError> {
        self.reader = None;
        self.pending = None;
        self.state = TransformState::new();
        self.host.restrictions().reset();

        control.world_loaded.store(false, Ordering::SeqCst);
        control.set_last_timestamp(0);
        control.mark_sent();
        control.restart_requested.store(false, Ordering::SeqCst);

        self.open()?;
        info!("Restarted replay");
        self.host.restarted();
        Ok(())
    }

    /// Filter one frame and hand the result to the sink.
    ///
    /// Only an unknown restriction is an error; everything else that goes
    /// wrong with a single frame is logged and the frame skipped.
    pub(crate) fn process(
        &mut self,
        frame: Frame,
        pacing: Pacing,
        control: &Control,
    ) -> Result<(), ReplayError> {
        let message = match Message::decode(&frame.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping frame at {}ms: {}", frame.timestamp_ms, e);
                return Ok(());
            }
        };

        let viewer = ViewerState {
            suppress_camera: self.host.suppress_camera_movement(),
            show_chat: self.host.show_chat(),
            camera: self.host.camera_position(),
        };
        let was_loaded = self.state.world_loaded;
        let verdict = transform::apply(
            &message,
            &mut self.state,
            &viewer,
            self.host.restrictions(),
            pacing,
            &self.transform,
        );

        if self.state.world_loaded && !was_loaded {
            debug!("World loaded at {}ms", frame.timestamp_ms);
            control.world_loaded.store(true, Ordering::SeqCst);
            self.host.world_loaded();
        }

        let delivered = match verdict {
            Verdict::Forward => {
                self.deliver(frame.payload);
                message
            }
            Verdict::Rewritten(rewritten) => {
                self.deliver(rewritten.encode());
                rewritten
            }
            Verdict::Drop(reason) => {
                trace!(
                    "Dropped {} at {}ms: {:?}",
                    message.kind(),
                    frame.timestamp_ms,
                    reason
                );
                return Ok(());
            }
            Verdict::ResourcePack { id } => {
                match self.packs.materialize(self.source.as_ref(), id) {
                    Ok(Some(path)) => self.host.load_resource_pack(&path),
                    Ok(None) => debug!("No resource pack for id {}", id),
                    Err(e) => warn!("Failed to extract resource pack {}: {}", id, e),
                }
                return Ok(());
            }
            Verdict::Fatal { directive } => {
                return Err(ReplayError::UnknownRestriction(directive));
            }
        };

        if let Message::PositionLook(look) = &delivered {
            self.host.camera_teleported(look.position());
        }
        if pacing == Pacing::Sync && delivered.kind().affects_entity_lifecycle() {
            self.host.purge_dead_entities();
        }
        Ok(())
    }

    fn deliver(&mut self, payload: Vec<u8>) {
        trace!("Delivering {} bytes", payload.len());
        if let Err(e) = self.sink.deliver(payload) {
            warn!("Failed to deliver packet: {}", e);
        }
    }

    pub(crate) fn move_camera_to_target(&mut self) {
        self.host.move_camera_to_target();
    }

    pub(crate) fn reached_end(&mut self) {
        self.host.reached_end();
    }

    /// Stop the session because of `error` and hand the error back
    pub(crate) fn fail(&mut self, control: &Control, error: ReplayError) -> ReplayError {
        control.terminated.store(true, Ordering::SeqCst);
        error!("Terminating replay: {}", error);
        self.host.fatal_error(&error);
        self.release();
        error
    }

    /// Close the log and delete temporary files. Runs once.
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.reader = None;
        self.pending = None;
        if let Err(e) = self.packs.release() {
            warn!("Failed to remove resource pack directory: {}", e);
        }
        debug!("Released replay resources");
    }
}

pub(crate) struct Shared {
    engine: Mutex<Engine>,
    pub(crate) control: Control,
}

impl Shared {
    pub(crate) fn engine(&self) -> MutexGuard<'_, Engine> {
        lock(&self.engine)
    }
}

// =============================================================================
// ReplaySender
// =============================================================================

/// Plays one replay into a viewer
pub struct ReplaySender {
    shared: Arc<Shared>,
    timing: Mutex<Option<JoinHandle<()>>>,
}

impl ReplaySender {
    /// Open `source` and start playing in `mode`
    pub fn new<S, H, K>(
        source: S,
        host: H,
        sink: K,
        mode: Mode,
        config: &ReplayConfig,
    ) -> Result<Self, ReplayError>
    where
        S: ReplaySource + 'static,
        H: ReplayHost + 'static,
        K: PacketSink + 'static,
    {
        let config = config.clone().sanitized();
        let duration_ms = source.duration_ms();
        let mut engine = Engine {
            source: Box::new(source),
            reader: None,
            pending: None,
            state: TransformState::new(),
            host: Box::new(host),
            sink: Box::new(sink),
            packs: ResourcePackCache::new(),
            transform: config.transform.clone(),
            released: false,
        };
        engine.open()?;

        let sender = Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                control: Control::new(&config, duration_ms),
            }),
            timing: Mutex::new(None),
        };
        sender.shared.control.mark_sent();
        info!("Opened replay ({}ms) in {} mode", duration_ms, mode);

        sender.set_mode(mode)?;
        Ok(sender)
    }

    fn control(&self) -> &Control {
        &self.shared.control
    }

    pub fn mode(&self) -> Mode {
        if self.control().is_async() {
            Mode::Async
        } else {
            Mode::Sync
        }
    }

    /// Switch between timed and explicit playback.
    ///
    /// Leaving async mode waits for the timing thread to exit, so no frame
    /// is delivered concurrently with a following [`play_until`].
    ///
    /// [`play_until`]: ReplaySender::play_until
    pub fn set_mode(&self, mode: Mode) -> Result<(), ReplayError> {
        let control = self.control();
        let mut timing = lock(&self.timing);
        match mode {
            Mode::Async => {
                if control.is_terminated() {
                    return Err(ReplayError::Terminated);
                }
                if control.is_async() {
                    return Ok(());
                }
                control.timing_stop.store(false, Ordering::SeqCst);
                control.async_mode.store(true, Ordering::SeqCst);
                control.mark_sent();

                let shared = self.shared.clone();
                let spawned = thread::Builder::new()
                    .name("replay-timing".to_string())
                    .spawn(move || timing::run(shared));
                match spawned {
                    Ok(handle) => *timing = Some(handle),
                    Err(e) => {
                        control.async_mode.store(false, Ordering::SeqCst);
                        return Err(e.into());
                    }
                }
                debug!("Switched to async mode");
            }
            Mode::Sync => {
                if !control.is_async() {
                    return Ok(());
                }
                control.timing_stop.store(true, Ordering::SeqCst);
                if let Some(handle) = timing.take() {
                    join_timing(handle);
                }
                control.async_mode.store(false, Ordering::SeqCst);
                control.timing_stop.store(false, Ordering::SeqCst);
                // A jump the timing thread never got to does not carry over
                *lock(&control.hurry_target) = None;
                control.restart_requested.store(false, Ordering::SeqCst);
                debug!("Switched to sync mode");
            }
        }
        Ok(())
    }

    /// Deliver every frame up to and including `timestamp` (sync mode only)
    pub fn play_until(&self, timestamp: u32) -> Result<(), ReplayError> {
        let control = self.control();
        if control.is_async() {
            return Err(ReplayError::PlayUntilInAsyncMode);
        }
        if control.is_terminated() {
            return Err(ReplayError::Terminated);
        }

        let mut engine = self.shared.engine();
        if engine.is_released() {
            return Err(ReplayError::Terminated);
        }

        let last = control.last_timestamp();
        if timestamp == last {
            return Ok(());
        }
        if timestamp < last {
            debug!("Going back from {}ms to {}ms", last, timestamp);
            if let Err(e) = engine.restart(control) {
                return Err(engine.fail(control, e));
            }
        }

        loop {
            let frame = match engine.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("End of log before {}ms", timestamp);
                    break;
                }
                Err(e) if e.is_end_of_log() => {
                    debug!("Log ends early: {}", e);
                    break;
                }
                Err(e) => {
                    warn!("Failed to read frame: {}", e);
                    break;
                }
            };
            if frame.timestamp_ms > timestamp {
                engine.hold(frame);
                break;
            }
            if let Err(e) = engine.process(frame, Pacing::Sync, control) {
                return Err(engine.fail(control, e));
            }
        }

        control.mark_sent();
        control.set_last_timestamp(timestamp);
        Ok(())
    }

    /// Jump to `timestamp` (async mode only).
    ///
    /// Jumping backwards starts over from the first frame. Either way the
    /// sender then hurries until a frame past `timestamp` was delivered.
    pub fn jump_to(&self, timestamp: u32) -> Result<(), ReplayError> {
        let control = self.control();
        if !control.is_async() {
            return Err(ReplayError::JumpInSyncMode);
        }
        if control.is_terminated() {
            return Err(ReplayError::Terminated);
        }

        let mut target = lock(&control.hurry_target);
        if timestamp < control.last_timestamp() && target.is_none() {
            control.request_restart();
        }
        *target = Some(timestamp);
        debug!("Jumping to {}ms", timestamp);
        Ok(())
    }

    pub fn is_hurrying(&self) -> bool {
        self.control().hurry_target().is_some()
    }

    /// Jump target while hurrying
    pub fn desired_timestamp(&self) -> Option<u32> {
        self.control().hurry_target()
    }

    /// Abandon the current jump and continue at normal pace
    pub fn stop_hurrying(&self) {
        *lock(&self.control().hurry_target) = None;
    }

    /// Set the speed multiplier; 0 pauses and keeps the previous speed
    pub fn set_speed(&self, speed: f64) {
        let control = self.control();
        if speed == 0.0 {
            control.set_paused(true);
        } else if speed.is_finite() && speed > 0.0 {
            control.speed.store(speed, Ordering::SeqCst);
            control.set_paused(false);
        } else {
            warn!("Ignoring invalid replay speed {}", speed);
        }
    }

    /// Speed multiplier, 0 while paused
    pub fn speed(&self) -> f64 {
        if self.is_paused() {
            0.0
        } else {
            self.control().speed()
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.control().set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.control().is_paused()
    }

    pub fn is_terminated(&self) -> bool {
        self.control().is_terminated()
    }

    pub fn is_world_loaded(&self) -> bool {
        self.control().is_world_loaded()
    }

    /// Timestamp of the last delivered frame (or play-until target)
    pub fn last_delivered_timestamp(&self) -> u32 {
        self.control().last_timestamp()
    }

    /// Current playback position in milliseconds
    pub fn current_timestamp(&self) -> u32 {
        let control = self.control();
        let last = control.last_timestamp();
        if !control.is_async() {
            return last;
        }
        let elapsed_ms = control.since_last_sent().as_secs_f64() * 1000.0;
        let advanced = (elapsed_ms * self.speed()) as u64;
        (last as u64 + advanced).min(u32::MAX as u64) as u32
    }

    /// Total replay length in milliseconds
    pub fn duration_ms(&self) -> u32 {
        self.control().duration_ms
    }

    pub fn state(&self) -> SenderState {
        if self.is_terminated() {
            SenderState::Terminated
        } else if self.is_hurrying() {
            SenderState::Hurrying
        } else if self.is_paused() {
            SenderState::Paused
        } else {
            SenderState::Playing
        }
    }

    pub fn status(&self) -> ReplayStatus {
        ReplayStatus {
            state: self.state().to_string(),
            mode: self.mode(),
            timestamp_ms: self.current_timestamp(),
            duration_ms: self.duration_ms(),
            speed: self.speed(),
            desired_timestamp_ms: self.desired_timestamp(),
            world_loaded: self.is_world_loaded(),
        }
    }

    /// Stop playback for good and release the log and temporary files
    pub fn terminate(&self) {
        let control = self.control();
        control.terminated.store(true, Ordering::SeqCst);
        control.timing_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = lock(&self.timing).take() {
            join_timing(handle);
        }
        self.shared.engine().release();
    }
}

impl Drop for ReplaySender {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn join_timing(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        warn!("Timing thread cannot wait for itself");
        return;
    }
    if handle.join().is_err() {
        error!("Timing thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::source::MemorySource;
    use crate::replay::test_support::*;
    use crossbeam::channel::unbounded;
    use reprise_core::transform::{LEGACY_ENTITY_ID, VIEWPOINT_ENTITY_ID};

    fn sync_sender(
        frames: &[Frame],
        show_chat: bool,
    ) -> (ReplaySender, crossbeam::channel::Receiver<Vec<u8>>, Events) {
        let (host, events) = RecordingHost::new(show_chat);
        let (tx, rx) = unbounded();
        let source = MemorySource::from_frames(frames).unwrap();
        let sender = ReplaySender::new(source, host, tx, Mode::Sync, &fast_config()).unwrap();
        (sender, rx, events)
    }

    #[test]
    fn test_hidden_chat_is_skipped() {
        let frames = vec![
            Frame::new(0, time_update(1)),
            Frame::new(100, chat("hello")),
            Frame::new(5000, time_update(2)),
        ];
        let (sender, rx, _events) = sync_sender(&frames, false);

        sender.play_until(5000).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1), time_update(2)]);
        assert!(sender.shared.engine().pending.is_none());
        assert_eq!(sender.last_delivered_timestamp(), 5000);
    }

    #[test]
    fn test_play_until_is_idempotent() {
        let frames = vec![
            Frame::new(0, time_update(1)),
            Frame::new(100, time_update(2)),
            Frame::new(200, time_update(3)),
        ];
        let (sender, rx, _events) = sync_sender(&frames, true);

        sender.play_until(150).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1), time_update(2)]);
        // Frame at 200 is held back
        assert!(sender.shared.engine().pending.is_some());

        sender.play_until(150).unwrap();
        assert!(drain(&rx).is_empty());

        sender.play_until(1000).unwrap();
        assert_eq!(drain(&rx), vec![time_update(3)]);
    }

    #[test]
    fn test_play_until_backwards_restarts() {
        let frames = vec![
            Frame::new(0, time_update(1)),
            Frame::new(100, time_update(2)),
            Frame::new(200, time_update(3)),
        ];
        let (host, events) = RecordingHost::new(true);
        let (tx, rx) = unbounded();
        let source = MemorySource::from_frames(&frames).unwrap();
        let log_handle = source.clone();
        let sender = ReplaySender::new(source, host, tx, Mode::Sync, &fast_config()).unwrap();

        sender.play_until(200).unwrap();
        assert_eq!(drain(&rx).len(), 3);
        assert_eq!(log_handle.opens(), 1);

        sender.play_until(50).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
        assert_eq!(log_handle.opens(), 2);
        assert_eq!(count(&events, |e| *e == HostEvent::Restarted), 1);
    }

    #[test]
    fn test_end_of_log_keeps_position() {
        let frames = vec![Frame::new(0, time_update(1)), Frame::new(10, time_update(2))];
        let (sender, rx, _events) = sync_sender(&frames, true);

        sender.play_until(1000).unwrap();
        assert_eq!(drain(&rx).len(), 2);
        sender.play_until(2000).unwrap();
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_truncated_log_ends_quietly() {
        let mut log = crate::replay::packet_log::encode_log(&[
            Frame::new(0, time_update(1)),
            Frame::new(10, time_update(2)),
        ])
        .unwrap();
        log.truncate(log.len() - 3);
        let (host, _events) = RecordingHost::new(true);
        let (tx, rx) = unbounded();
        let sender = ReplaySender::new(
            MemorySource::from_log(log),
            host,
            tx,
            Mode::Sync,
            &fast_config(),
        )
        .unwrap();

        sender.play_until(100).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
    }

    #[test]
    fn test_corrupt_header_ends_log() {
        let log = log_with_corrupt_header(
            Frame::new(0, time_update(1)),
            Frame::new(10, chat("after")),
        );
        let (host, _events) = RecordingHost::new(true);
        let (tx, rx) = unbounded();
        let sender = ReplaySender::new(
            MemorySource::from_log(log),
            host,
            tx,
            Mode::Sync,
            &fast_config(),
        )
        .unwrap();

        sender.play_until(100).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
        sender.play_until(200).unwrap();
        assert!(drain(&rx).is_empty());

        // Going back reads the intact part again
        sender.play_until(0).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
    }

    #[test]
    fn test_suppressed_camera_drops_position_updates() {
        let frames = vec![
            Frame::new(0, position_look(0.0, 64.0, 0.0)),
            Frame::new(10, time_update(1)),
        ];
        let (mut host, events) = RecordingHost::new(true);
        host.inner.suppress_camera = true;
        let (tx, rx) = unbounded();
        let source = MemorySource::from_frames(&frames).unwrap();
        let sender = ReplaySender::new(source, host, tx, Mode::Sync, &fast_config()).unwrap();

        sender.play_until(10).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
        assert!(sender.is_world_loaded());
        assert_eq!(count(&events, |e| *e == HostEvent::WorldLoaded), 1);
        assert_eq!(
            count(&events, |e| matches!(e, HostEvent::CameraTeleported(_))),
            0
        );
    }

    #[test]
    fn test_small_position_corrections_are_dropped() {
        let first = position_look(0.0, 64.0, 0.0);
        let allowed = position_look(1.0, 64.0, 1.0);
        let correction = position_look(2.0, 64.0, 2.0);
        let teleport = position_look(300.0, 64.0, 0.0);
        let frames = vec![
            Frame::new(0, join_game(5)),
            Frame::new(10, first.clone()),
            Frame::new(20, allowed.clone()),
            Frame::new(30, correction),
            Frame::new(40, teleport.clone()),
        ];
        let (sender, rx, events) = sync_sender(&frames, true);

        sender.play_until(40).unwrap();
        let delivered = drain(&rx);
        assert_eq!(delivered.len(), 4);
        assert_eq!(delivered[1..], [first, allowed, teleport]);
        assert_eq!(
            count(&events, |e| matches!(e, HostEvent::CameraTeleported(_))),
            3
        );
    }

    #[test]
    fn test_corrupt_frame_is_skipped() {
        let frames = vec![
            Frame::new(0, vec![0x7F, 0x01]),
            Frame::new(10, vec![]),
            Frame::new(20, time_update(1)),
        ];
        let (sender, rx, _events) = sync_sender(&frames, true);

        sender.play_until(20).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
    }

    #[test]
    fn test_viewpoint_and_legacy_ids() {
        let frames = vec![
            Frame::new(0, join_game(57)),
            Frame::new(10, spawn_player(LEGACY_ENTITY_ID)),
            Frame::new(20, health()),
            Frame::new(30, spawn_player(12)),
        ];
        let (sender, rx, events) = sync_sender(&frames, true);

        sender.play_until(30).unwrap();
        let delivered: Vec<Message> = drain(&rx)
            .iter()
            .map(|p| Message::decode(p).unwrap())
            .collect();
        assert_eq!(delivered.len(), 3);

        match &delivered[0] {
            Message::JoinGame(j) => assert_eq!(j.entity_id, VIEWPOINT_ENTITY_ID),
            other => panic!("unexpected message {:?}", other),
        }
        match &delivered[1] {
            Message::Entity(e) => assert_eq!(e.entity_id, 57),
            other => panic!("unexpected message {:?}", other),
        }
        match &delivered[2] {
            Message::Entity(e) => assert_eq!(e.entity_id, 12),
            other => panic!("unexpected message {:?}", other),
        }
        // One purge per delivered spawn
        assert_eq!(count(&events, |e| *e == HostEvent::PurgeDeadEntities), 2);
    }

    #[test]
    fn test_unknown_restriction_terminates() {
        let frames = vec![
            Frame::new(0, time_update(1)),
            Frame::new(10, restriction("no_flying")),
            Frame::new(20, time_update(2)),
        ];
        let (sender, rx, events) = sync_sender(&frames, true);

        let err = sender.play_until(100).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownRestriction(ref d) if d == "no_flying"));
        assert_eq!(drain(&rx), vec![time_update(1)]);
        assert!(sender.is_terminated());
        assert_eq!(count(&events, |e| matches!(e, HostEvent::FatalError(_))), 1);
        assert!(sender.shared.engine().is_released());

        assert!(matches!(
            sender.play_until(200),
            Err(ReplayError::Terminated)
        ));
    }

    #[test]
    fn test_known_restriction_is_consumed() {
        let frames = vec![
            Frame::new(0, restriction("only_first_person")),
            Frame::new(10, time_update(1)),
        ];
        let (sender, rx, _events) = sync_sender(&frames, true);

        sender.play_until(10).unwrap();
        assert_eq!(drain(&rx), vec![time_update(1)]);
        assert!(!sender.is_terminated());
    }

    #[test]
    fn test_resource_pack_redirect() {
        let frames = vec![
            Frame::new(0, resource_pack("replay://4")),
            Frame::new(10, resource_pack("replay://9")),
        ];
        let (host, events) = RecordingHost::new(true);
        let (tx, rx) = unbounded();
        let source = MemorySource::from_frames(&frames)
            .unwrap()
            .with_resource_pack(4, "beef42", b"pack".to_vec());
        let sender = ReplaySender::new(source, host, tx, Mode::Sync, &fast_config()).unwrap();

        sender.play_until(10).unwrap();
        assert!(drain(&rx).is_empty());

        let loaded: Vec<_> = lock(&events)
            .iter()
            .filter_map(|e| match e {
                HostEvent::ResourcePack(path) => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].ends_with("beef42.zip"));
        assert_eq!(std::fs::read(&loaded[0]).unwrap(), b"pack");

        sender.terminate();
        assert!(!loaded[0].exists());
    }

    #[test]
    fn test_mode_errors() {
        let frames = vec![Frame::new(0, time_update(1))];
        let (sender, _rx, _events) = sync_sender(&frames, true);

        assert!(matches!(sender.jump_to(0), Err(ReplayError::JumpInSyncMode)));

        sender.set_mode(Mode::Async).unwrap();
        assert_eq!(sender.mode(), Mode::Async);
        assert!(matches!(
            sender.play_until(0),
            Err(ReplayError::PlayUntilInAsyncMode)
        ));

        sender.set_mode(Mode::Sync).unwrap();
        assert_eq!(sender.mode(), Mode::Sync);
        assert!(!sender.is_hurrying());
    }

    #[test]
    fn test_speed_zero_pauses_and_keeps_speed() {
        let (sender, _rx, _events) = sync_sender(&[Frame::new(0, time_update(1))], true);
        sender.set_speed(2.5);
        assert_eq!(sender.speed(), 2.5);

        sender.set_speed(0.0);
        assert!(sender.is_paused());
        assert_eq!(sender.speed(), 0.0);
        assert_eq!(sender.state(), SenderState::Paused);

        sender.set_paused(false);
        assert_eq!(sender.speed(), 2.5);

        sender.set_speed(-1.0);
        assert_eq!(sender.speed(), 2.5);
    }

    #[test]
    fn test_status_reports_sync_position() {
        let frames = vec![Frame::new(0, time_update(1)), Frame::new(800, time_update(2))];
        let (sender, _rx, _events) = sync_sender(&frames, true);
        sender.play_until(400).unwrap();

        let status = sender.status();
        assert_eq!(status.state, "playing");
        assert_eq!(status.mode, Mode::Sync);
        assert_eq!(status.timestamp_ms, 400);
        assert_eq!(status.duration_ms, 800);
        assert_eq!(sender.current_timestamp(), 400);
    }
}

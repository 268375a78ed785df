//! Packet builders and a recording host shared by the replay tests

use crossbeam::channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use reprise_core::protocol::PacketWriter;
use reprise_core::{Position, RestrictionHandler, RESTRICTION_CHANNEL};

use crate::config::ReplayConfig;
use crate::error::ReplayError;

use super::host::{BasicHost, ReplayHost};
use super::packet_log::{encode_log, Frame};

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Restarted,
    WorldLoaded,
    ReachedEnd,
    PurgeDeadEntities,
    MoveCameraToTarget,
    CameraTeleported(Position),
    ResourcePack(PathBuf),
    FatalError(String),
}

pub type Events = Arc<Mutex<Vec<HostEvent>>>;

/// [`BasicHost`] that also records every notification
pub struct RecordingHost {
    pub inner: BasicHost,
    events: Events,
}

impl RecordingHost {
    pub fn new(show_chat: bool) -> (Self, Events) {
        let events = Events::default();
        let host = Self {
            inner: BasicHost::new(show_chat),
            events: events.clone(),
        };
        (host, events)
    }

    fn push(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ReplayHost for RecordingHost {
    fn restrictions(&mut self) -> &mut dyn RestrictionHandler {
        self.inner.restrictions()
    }

    fn suppress_camera_movement(&self) -> bool {
        self.inner.suppress_camera_movement()
    }

    fn show_chat(&self) -> bool {
        self.inner.show_chat()
    }

    fn camera_position(&self) -> Option<Position> {
        self.inner.camera_position()
    }

    fn load_resource_pack(&mut self, path: &Path) {
        self.push(HostEvent::ResourcePack(path.to_path_buf()));
    }

    fn purge_dead_entities(&mut self) {
        self.push(HostEvent::PurgeDeadEntities);
    }

    fn move_camera_to_target(&mut self) {
        self.push(HostEvent::MoveCameraToTarget);
    }

    fn camera_teleported(&mut self, position: Position) {
        self.inner.camera_teleported(position);
        self.push(HostEvent::CameraTeleported(position));
    }

    fn world_loaded(&mut self) {
        self.push(HostEvent::WorldLoaded);
    }

    fn restarted(&mut self) {
        self.inner.restarted();
        self.push(HostEvent::Restarted);
    }

    fn reached_end(&mut self) {
        self.push(HostEvent::ReachedEnd);
    }

    fn fatal_error(&mut self, error: &ReplayError) {
        self.push(HostEvent::FatalError(error.to_string()));
    }
}

pub fn count(events: &Events, pred: impl Fn(&HostEvent) -> bool) -> usize {
    events.lock().unwrap().iter().filter(|e| pred(e)).count()
}

pub fn fast_config() -> ReplayConfig {
    ReplayConfig {
        poll_interval_ms: 2,
        ..Default::default()
    }
}

/// Everything delivered so far
pub fn drain(rx: &Receiver<Vec<u8>>) -> Vec<Vec<u8>> {
    rx.try_iter().collect()
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn thread_sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

// =============================================================================
// Packets
// =============================================================================

pub fn time_update(time: i64) -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x03);
    w.write_bytes(&1000i64.to_be_bytes())
        .write_bytes(&time.to_be_bytes());
    w.into_bytes()
}

pub fn chat(text: &str) -> Vec<u8> {
    let json = serde_json::json!({ "text": text }).to_string();
    let mut w = PacketWriter::with_id(0x02);
    w.write_string(&json).write_i8(0);
    w.into_bytes()
}

pub fn position_look(x: f64, y: f64, z: f64) -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x08);
    w.write_f64(x)
        .write_f64(y)
        .write_f64(z)
        .write_f32(0.0)
        .write_f32(0.0)
        .write_u8(0);
    w.into_bytes()
}

pub fn join_game(entity_id: i32) -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x01);
    w.write_i32(entity_id)
        .write_u8(0)
        .write_i8(0)
        .write_u8(1)
        .write_u8(20)
        .write_string("default")
        .write_bool(false);
    w.into_bytes()
}

pub fn spawn_player(entity_id: i32) -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x0C);
    w.write_varint(entity_id).write_bytes(&[0xAB; 16]).write_bytes(&[0; 12]);
    w.into_bytes()
}

pub fn health() -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x06);
    w.write_f32(20.0).write_varint(20).write_f32(5.0);
    w.into_bytes()
}

pub fn restriction(directive: &str) -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x3F);
    w.write_string(RESTRICTION_CHANNEL)
        .write_string(directive)
        .write_bool(true);
    w.into_bytes()
}

pub fn resource_pack(url: &str) -> Vec<u8> {
    let mut w = PacketWriter::with_id(0x48);
    w.write_string(url).write_string("");
    w.into_bytes()
}

/// A log whose second frame header claims a negative length
pub fn log_with_corrupt_header(before: Frame, after: Frame) -> Vec<u8> {
    let mut log = encode_log(&[before]).unwrap();
    log.extend_from_slice(&[0, 0, 0, 5, 0xFF, 0xFF, 0xFF, 0xFF]);
    log.extend_from_slice(&encode_log(&[after]).unwrap());
    log
}

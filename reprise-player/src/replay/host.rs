//! Collaborators of the replay sender.
//!
//! [`PacketSink`] receives the filtered packets; [`ReplayHost`] is the
//! viewer the replay is shown in. Both are called with the sender's engine
//! lock held, so they must not call back into the [`ReplaySender`].
//!
//! [`ReplaySender`]: super::sender::ReplaySender

use crossbeam::channel::Sender;
use log::{debug, error, info};
use std::io;
use std::path::Path;

use reprise_core::{Position, RestrictionHandler, Restrictions};

use crate::error::ReplayError;

/// Receives packets in their wire form
pub trait PacketSink: Send {
    fn deliver(&mut self, payload: Vec<u8>) -> Result<(), ReplayError>;
}

impl PacketSink for Sender<Vec<u8>> {
    fn deliver(&mut self, payload: Vec<u8>) -> Result<(), ReplayError> {
        self.send(payload).map_err(|_| {
            ReplayError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "packet receiver disconnected",
            ))
        })
    }
}

/// The viewer a replay is played into
pub trait ReplayHost: Send {
    /// Handler for restriction directives found in the recording
    fn restrictions(&mut self) -> &mut dyn RestrictionHandler;

    /// Position updates from the recording are ignored while this is set
    fn suppress_camera_movement(&self) -> bool {
        false
    }

    fn show_chat(&self) -> bool {
        true
    }

    /// Where the viewer's camera currently is, `None` before it exists
    fn camera_position(&self) -> Option<Position> {
        None
    }

    fn load_resource_pack(&mut self, _path: &Path) {}

    /// Remove entities that died since the last call (sync mode has no ticks)
    fn purge_dead_entities(&mut self) {}

    /// A jump finished; move the camera to where the user wanted to be
    fn move_camera_to_target(&mut self) {}

    /// A position update from the recording was delivered
    fn camera_teleported(&mut self, _position: Position) {}

    /// The first position update of a playback pass was seen
    fn world_loaded(&mut self) {}

    /// Playback started over from the first frame
    fn restarted(&mut self) {}

    /// The last frame of the log has been processed
    fn reached_end(&mut self) {}

    /// Playback stopped for good because of `error`
    fn fatal_error(&mut self, _error: &ReplayError) {}
}

/// A host without a renderer: tracks the camera and logs events
#[derive(Debug, Default)]
pub struct BasicHost {
    pub show_chat: bool,
    pub suppress_camera: bool,
    pub camera: Option<Position>,
    pub restrictions: Restrictions,
    /// Last resource pack handed to the viewer
    pub resource_pack: Option<std::path::PathBuf>,
}

impl BasicHost {
    pub fn new(show_chat: bool) -> Self {
        Self {
            show_chat,
            ..Default::default()
        }
    }
}

impl ReplayHost for BasicHost {
    fn restrictions(&mut self) -> &mut dyn RestrictionHandler {
        &mut self.restrictions
    }

    fn suppress_camera_movement(&self) -> bool {
        self.suppress_camera
    }

    fn show_chat(&self) -> bool {
        self.show_chat
    }

    fn camera_position(&self) -> Option<Position> {
        self.camera
    }

    fn load_resource_pack(&mut self, path: &Path) {
        info!("Loading resource pack {}", path.display());
        self.resource_pack = Some(path.to_path_buf());
    }

    fn camera_teleported(&mut self, position: Position) {
        debug!(
            "Camera at {:.1} {:.1} {:.1}",
            position.x, position.y, position.z
        );
        self.camera = Some(position);
    }

    fn world_loaded(&mut self) {
        info!("World loaded");
    }

    fn restarted(&mut self) {
        info!("Replay restarted");
        self.camera = None;
    }

    fn reached_end(&mut self) {
        info!("Reached end of replay");
    }

    fn fatal_error(&mut self, error: &ReplayError) {
        error!("Replay stopped: {}", error);
    }
}

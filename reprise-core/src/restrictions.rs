//! Replay restrictions
//!
//! A recording server can limit how its replays may be viewed by sending
//! directives on a reserved plugin channel. The replay filter hands those
//! payloads to a [`RestrictionHandler`]; a directive the handler does not
//! understand ends the session, because playing on would ignore a limit
//! the server asked for.

use serde::{Deserialize, Serialize};

use crate::protocol::{CustomPayload, PacketReader};

/// Plugin channel that carries restriction directives
pub const RESTRICTION_CHANNEL: &str = "Replay|Restrict";

/// Receives restriction directives found in the recording
pub trait RestrictionHandler: Send {
    /// Apply a restriction payload.
    ///
    /// Returns `None` when every directive was understood, otherwise the
    /// first directive that was not.
    fn handle(&mut self, payload: &CustomPayload) -> Option<String>;

    /// Forget everything applied so far (called when playback restarts)
    fn reset(&mut self) {}
}

/// The restrictions a recording may impose
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    pub no_xray: bool,
    pub no_noclip: bool,
    pub only_first_person: bool,
    pub only_recording_player: bool,
}

impl Restrictions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RestrictionHandler for Restrictions {
    fn handle(&mut self, payload: &CustomPayload) -> Option<String> {
        let mut r = PacketReader::new(&payload.data);
        while r.remaining() > 0 {
            let (name, active) = match r.read_string().and_then(|n| Ok((n, r.read_bool()?))) {
                Ok(directive) => directive,
                Err(e) => return Some(format!("malformed directive ({})", e)),
            };
            match name.as_str() {
                "no_xray" => self.no_xray = active,
                "no_noclip" => self.no_noclip = active,
                "only_first_person" => self.only_first_person = active,
                "only_recording_player" => self.only_recording_player = active,
                _ => return Some(name),
            }
        }
        None
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

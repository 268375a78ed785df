//! Replay filter
//!
//! Every recorded packet passes through [`apply`] before it reaches the
//! viewer. The filter turns the recording player's session into a passive
//! spectator session: it drops client-only state, pins the viewpoint entity,
//! smooths out small position corrections and resolves embedded resource
//! packs.
//!
//! The function is pure. Everything it needs from the outside world comes in
//! through [`ViewerState`], everything it remembers between packets lives in
//! [`TransformState`], and side effects are described by the returned
//! [`Verdict`] for the caller to carry out.

use serde::{Deserialize, Serialize};

use crate::protocol::message::GAME_MODE_SPECTATOR;
use crate::protocol::packets::Policy;
use crate::protocol::{Message, PacketKind, Position};
use crate::restrictions::{RestrictionHandler, RESTRICTION_CHANNEL};

// =============================================================================
// Constants
// =============================================================================

/// Placeholder id older recordings used for the recording player
pub const LEGACY_ENTITY_ID: i32 = i32::MIN + 9001;

/// Entity id given to the viewpoint; negative so no server can issue it
pub const VIEWPOINT_ENTITY_ID: i32 = -1_789_435;

/// Disconnect text that older servers sent to clients without restriction support
pub const UPDATE_NOTICE: &str = "Please update to view this replay.";

/// URL scheme of resource packs stored inside the replay
pub const RESOURCE_PACK_SCHEME: &str = "replay://";

/// Change-game-state reasons that are delivered (rain and sky fade)
pub const ALLOWED_GAME_STATE_REASONS: &[u8] = &[1, 2, 7, 8];

pub const DEFAULT_TELEPORT_DISTANCE_LIMIT: f64 = 128.0;
pub const DEFAULT_HURRY_SKIP_THRESHOLD_MS: u32 = 1000;

// =============================================================================
// State
// =============================================================================

/// Tunable thresholds of the filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformConfig {
    /// Per-axis distance below which an unrequested position update is ignored
    pub teleport_distance_limit: f64,
    /// How far ahead a seek target must be before cosmetic packets are skipped
    pub hurry_skip_threshold_ms: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            teleport_distance_limit: DEFAULT_TELEPORT_DISTANCE_LIMIT,
            hurry_skip_threshold_ms: DEFAULT_HURRY_SKIP_THRESHOLD_MS,
        }
    }
}

/// What the filter remembers across packets of one playback pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformState {
    /// Id of the recording player, taken from join-game
    pub real_entity_id: Option<i32>,
    /// The next position update is delivered regardless of distance
    pub movement_allowed: bool,
    /// A position-look has been seen
    pub world_loaded: bool,
}

impl TransformState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Viewer-side inputs sampled before each packet
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub suppress_camera: bool,
    pub show_chat: bool,
    pub camera: Option<Position>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            suppress_camera: false,
            show_chat: true,
            camera: None,
        }
    }
}

/// How the packet is being delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Timed playback. `hurry_remaining_ms` is the distance to the seek
    /// target while hurrying.
    Async { hurry_remaining_ms: Option<i64> },
    /// Explicit play-until
    Sync,
}

/// Why a packet was not delivered
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Policy(PacketKind),
    RestrictionApplied,
    UpdateNotice,
    UnresolvedLegacyId,
    InvalidResourcePackUrl(String),
    CameraSuppressed,
    RelativePosition,
    MinorCorrection,
    GameStateReason(u8),
    ChatHidden,
    HurryThinning,
}

/// Outcome of filtering one packet
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Deliver the recorded bytes unchanged
    Forward,
    /// Deliver this message instead
    Rewritten(Message),
    Drop(DropReason),
    /// Load the embedded resource pack with this index id, deliver nothing
    ResourcePack { id: u32 },
    /// The recording carries a restriction this viewer does not understand
    Fatal { directive: String },
}

// =============================================================================
// Filter
// =============================================================================

/// Filter one decoded packet
pub fn apply(
    message: &Message,
    state: &mut TransformState,
    viewer: &ViewerState,
    restrictions: &mut dyn RestrictionHandler,
    pacing: Pacing,
    config: &TransformConfig,
) -> Verdict {
    if message.kind().policy() == Policy::Drop {
        return Verdict::Drop(DropReason::Policy(message.kind()));
    }

    let mut rewritten = match rewrite_legacy_ids(message, state.real_entity_id) {
        Ok(rewritten) => rewritten,
        Err(reason) => return Verdict::Drop(reason),
    };

    match message {
        Message::CustomPayload(payload) if payload.channel == RESTRICTION_CHANNEL => {
            return match restrictions.handle(payload) {
                None => Verdict::Drop(DropReason::RestrictionApplied),
                Some(directive) => Verdict::Fatal { directive },
            };
        }
        Message::Disconnect(disconnect) if disconnect.plain_text() == UPDATE_NOTICE => {
            return Verdict::Drop(DropReason::UpdateNotice);
        }
        Message::ResourcePackSend(pack) => {
            if let Some(id) = pack.url.strip_prefix(RESOURCE_PACK_SCHEME) {
                return match id.parse() {
                    Ok(id) => Verdict::ResourcePack { id },
                    Err(_) => Verdict::Drop(DropReason::InvalidResourcePackUrl(pack.url.clone())),
                };
            }
        }
        Message::JoinGame(join) => {
            state.real_entity_id = Some(join.entity_id);
            state.movement_allowed = true;
            let mut join = join.clone();
            join.entity_id = VIEWPOINT_ENTITY_ID;
            join.game_mode = GAME_MODE_SPECTATOR;
            join.hardcore = false;
            join.reduced_debug_info = false;
            rewritten = Some(Message::JoinGame(join));
        }
        Message::Respawn(respawn) => {
            state.movement_allowed = true;
            let mut respawn = respawn.clone();
            respawn.game_mode = GAME_MODE_SPECTATOR;
            rewritten = Some(Message::Respawn(respawn));
        }
        Message::PositionLook(look) => {
            state.world_loaded = true;
            if viewer.suppress_camera {
                return Verdict::Drop(DropReason::CameraSuppressed);
            }
            if look.has_relative_position() {
                return Verdict::Drop(DropReason::RelativePosition);
            }
            if let Some(camera) = viewer.camera {
                let limit = config.teleport_distance_limit;
                let far = (camera.x - look.x).abs() > limit || (camera.z - look.z).abs() > limit;
                if !state.movement_allowed && !far {
                    return Verdict::Drop(DropReason::MinorCorrection);
                }
                state.movement_allowed = false;
            }
        }
        Message::ChangeGameState(change) => {
            if !ALLOWED_GAME_STATE_REASONS.contains(&change.reason) {
                return Verdict::Drop(DropReason::GameStateReason(change.reason));
            }
        }
        Message::Chat(_) if !viewer.show_chat => {
            return Verdict::Drop(DropReason::ChatHidden);
        }
        _ => {}
    }

    if let Pacing::Async {
        hurry_remaining_ms: Some(remaining),
    } = pacing
    {
        if remaining > config.hurry_skip_threshold_ms as i64 && is_cosmetic(message) {
            return Verdict::Drop(DropReason::HurryThinning);
        }
    }

    match rewritten {
        Some(message) => Verdict::Rewritten(message),
        None => Verdict::Forward,
    }
}

/// Packets nobody misses while fast-forwarding
fn is_cosmetic(message: &Message) -> bool {
    match message {
        Message::Other {
            kind: PacketKind::Particles,
            ..
        } => true,
        Message::Entity(entity) => entity.is_firework(),
        _ => false,
    }
}

/// Replace the legacy placeholder id with the recording player's id.
///
/// Returns `Ok(None)` when nothing had to change.
fn rewrite_legacy_ids(
    message: &Message,
    real_entity_id: Option<i32>,
) -> Result<Option<Message>, DropReason> {
    let uses_legacy = match message {
        Message::Entity(m) => m.entity_id == LEGACY_ENTITY_ID,
        Message::AttachEntity(m) => {
            m.entity_id == LEGACY_ENTITY_ID || m.vehicle_id == LEGACY_ENTITY_ID
        }
        Message::CollectItem(m) => {
            m.collected_id == LEGACY_ENTITY_ID || m.collector_id == LEGACY_ENTITY_ID
        }
        Message::DestroyEntities(m) => m.entity_ids.contains(&LEGACY_ENTITY_ID),
        _ => false,
    };
    if !uses_legacy {
        return Ok(None);
    }
    let real = real_entity_id.ok_or(DropReason::UnresolvedLegacyId)?;
    let fix = |id: i32| if id == LEGACY_ENTITY_ID { real } else { id };

    let mut message = message.clone();
    match &mut message {
        Message::Entity(m) => m.entity_id = fix(m.entity_id),
        Message::AttachEntity(m) => {
            m.entity_id = fix(m.entity_id);
            m.vehicle_id = fix(m.vehicle_id);
        }
        Message::CollectItem(m) => {
            m.collected_id = fix(m.collected_id);
            m.collector_id = fix(m.collector_id);
        }
        Message::DestroyEntities(m) => {
            for id in m.entity_ids.iter_mut() {
                *id = fix(*id);
            }
        }
        _ => {}
    }
    Ok(Some(message))
}

//! Typed model of the recorded packets the replay filter cares about
//!
//! Only the kinds that get rewritten or inspected are decoded field by field.
//! Everything else stays an opaque body behind [`Message::Other`], which
//! re-encodes to exactly the recorded bytes.

use serde_json::Value;

use super::packets::{PacketKind, OBJECT_TYPE_FIREWORK};
use super::{PacketReader, PacketWriter};
use crate::error::DecodeError;

// =============================================================================
// Constants
// =============================================================================

/// Hardcore flag inside the join-game game mode byte
pub const GAME_MODE_HARDCORE: u8 = 0x08;

/// Spectator game mode
pub const GAME_MODE_SPECTATOR: u8 = 3;

/// Position-look flag bits for relative coordinates
pub const RELATIVE_X: u8 = 0x01;
pub const RELATIVE_Y: u8 = 0x02;
pub const RELATIVE_Z: u8 = 0x04;
pub const RELATIVE_YAW: u8 = 0x08;
pub const RELATIVE_PITCH: u8 = 0x10;

// =============================================================================
// Message bodies
// =============================================================================

/// A point in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id: i32,
    /// Game mode without the hardcore bit
    pub game_mode: u8,
    pub hardcore: bool,
    pub dimension: i8,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub reduced_debug_info: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Respawn {
    pub dimension: i32,
    pub difficulty: u8,
    pub game_mode: u8,
    pub level_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub flags: u8,
}

impl PositionLook {
    /// True if any of X, Y or Z is relative to the current position
    pub fn has_relative_position(&self) -> bool {
        self.flags & (RELATIVE_X | RELATIVE_Y | RELATIVE_Z) != 0
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    /// JSON chat component
    pub json: String,
    pub position: i8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    /// JSON chat component
    pub reason: String,
}

impl Disconnect {
    /// Reason with all formatting removed
    pub fn plain_text(&self) -> String {
        plain_text(&self.reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomPayload {
    pub channel: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePackSend {
    pub url: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeGameState {
    pub reason: u8,
    pub value: f32,
}

/// Any packet whose body starts with a VarInt entity id
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMessage {
    pub kind: PacketKind,
    pub entity_id: i32,
    /// Body after the entity id, kept verbatim
    pub rest: Vec<u8>,
}

impl EntityMessage {
    /// Object type for spawn-object, `None` for every other kind
    pub fn object_type(&self) -> Option<u8> {
        match self.kind {
            PacketKind::SpawnObject => self.rest.first().copied(),
            _ => None,
        }
    }

    pub fn is_firework(&self) -> bool {
        self.object_type() == Some(OBJECT_TYPE_FIREWORK)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachEntity {
    pub entity_id: i32,
    pub vehicle_id: i32,
    pub leash: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectItem {
    pub collected_id: i32,
    pub collector_id: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestroyEntities {
    pub entity_ids: Vec<i32>,
}

// =============================================================================
// Message
// =============================================================================

/// A decoded recorded packet
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    JoinGame(JoinGame),
    Respawn(Respawn),
    PositionLook(PositionLook),
    Chat(Chat),
    Disconnect(Disconnect),
    CustomPayload(CustomPayload),
    ResourcePackSend(ResourcePackSend),
    ChangeGameState(ChangeGameState),
    Entity(EntityMessage),
    AttachEntity(AttachEntity),
    CollectItem(CollectItem),
    DestroyEntities(DestroyEntities),
    Other { kind: PacketKind, body: Vec<u8> },
}

impl Message {
    /// Decode a full payload (VarInt id followed by the body)
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let mut r = PacketReader::new(payload);
        let kind = PacketKind::from_id(r.read_varint()?)?;

        let message = match kind {
            PacketKind::JoinGame => {
                let entity_id = r.read_i32()?;
                let mode = r.read_u8()?;
                Message::JoinGame(JoinGame {
                    entity_id,
                    game_mode: mode & !GAME_MODE_HARDCORE,
                    hardcore: mode & GAME_MODE_HARDCORE != 0,
                    dimension: r.read_i8()?,
                    difficulty: r.read_u8()?,
                    max_players: r.read_u8()?,
                    level_type: r.read_string()?,
                    reduced_debug_info: r.read_bool()?,
                })
            }
            PacketKind::Respawn => Message::Respawn(Respawn {
                dimension: r.read_i32()?,
                difficulty: r.read_u8()?,
                game_mode: r.read_u8()?,
                level_type: r.read_string()?,
            }),
            PacketKind::PlayerPositionLook => Message::PositionLook(PositionLook {
                x: r.read_f64()?,
                y: r.read_f64()?,
                z: r.read_f64()?,
                yaw: r.read_f32()?,
                pitch: r.read_f32()?,
                flags: r.read_u8()?,
            }),
            PacketKind::Chat => Message::Chat(Chat {
                json: r.read_string()?,
                position: r.read_i8()?,
            }),
            PacketKind::Disconnect => Message::Disconnect(Disconnect {
                reason: r.read_string()?,
            }),
            PacketKind::CustomPayload => Message::CustomPayload(CustomPayload {
                channel: r.read_string()?,
                data: r.read_remaining().to_vec(),
            }),
            PacketKind::ResourcePackSend => Message::ResourcePackSend(ResourcePackSend {
                url: r.read_string()?,
                hash: r.read_string()?,
            }),
            PacketKind::ChangeGameState => Message::ChangeGameState(ChangeGameState {
                reason: r.read_u8()?,
                value: r.read_f32()?,
            }),
            PacketKind::AttachEntity => Message::AttachEntity(AttachEntity {
                entity_id: r.read_i32()?,
                vehicle_id: r.read_i32()?,
                leash: r.read_bool()?,
            }),
            PacketKind::CollectItem => Message::CollectItem(CollectItem {
                collected_id: r.read_varint()?,
                collector_id: r.read_varint()?,
            }),
            PacketKind::DestroyEntities => {
                let count = r.read_varint()?;
                if count < 0 {
                    return Err(DecodeError::NegativeLength(count));
                }
                let mut entity_ids = Vec::with_capacity((count as usize).min(r.remaining()));
                for _ in 0..count {
                    entity_ids.push(r.read_varint()?);
                }
                Message::DestroyEntities(DestroyEntities { entity_ids })
            }
            kind if kind.is_entity_addressed() => Message::Entity(EntityMessage {
                kind,
                entity_id: r.read_varint()?,
                rest: r.read_remaining().to_vec(),
            }),
            kind => Message::Other {
                kind,
                body: r.read_remaining().to_vec(),
            },
        };
        Ok(message)
    }

    /// Encode back into a full payload
    pub fn encode(&self) -> Vec<u8> {
        let mut w = PacketWriter::with_id(self.kind().id());
        match self {
            Message::JoinGame(m) => {
                let mode = if m.hardcore {
                    m.game_mode | GAME_MODE_HARDCORE
                } else {
                    m.game_mode
                };
                w.write_i32(m.entity_id)
                    .write_u8(mode)
                    .write_i8(m.dimension)
                    .write_u8(m.difficulty)
                    .write_u8(m.max_players)
                    .write_string(&m.level_type)
                    .write_bool(m.reduced_debug_info);
            }
            Message::Respawn(m) => {
                w.write_i32(m.dimension)
                    .write_u8(m.difficulty)
                    .write_u8(m.game_mode)
                    .write_string(&m.level_type);
            }
            Message::PositionLook(m) => {
                w.write_f64(m.x)
                    .write_f64(m.y)
                    .write_f64(m.z)
                    .write_f32(m.yaw)
                    .write_f32(m.pitch)
                    .write_u8(m.flags);
            }
            Message::Chat(m) => {
                w.write_string(&m.json).write_i8(m.position);
            }
            Message::Disconnect(m) => {
                w.write_string(&m.reason);
            }
            Message::CustomPayload(m) => {
                w.write_string(&m.channel).write_bytes(&m.data);
            }
            Message::ResourcePackSend(m) => {
                w.write_string(&m.url).write_string(&m.hash);
            }
            Message::ChangeGameState(m) => {
                w.write_u8(m.reason).write_f32(m.value);
            }
            Message::Entity(m) => {
                w.write_varint(m.entity_id).write_bytes(&m.rest);
            }
            Message::AttachEntity(m) => {
                w.write_i32(m.entity_id)
                    .write_i32(m.vehicle_id)
                    .write_bool(m.leash);
            }
            Message::CollectItem(m) => {
                w.write_varint(m.collected_id).write_varint(m.collector_id);
            }
            Message::DestroyEntities(m) => {
                w.write_varint(m.entity_ids.len() as i32);
                for id in &m.entity_ids {
                    w.write_varint(*id);
                }
            }
            Message::Other { body, .. } => {
                w.write_bytes(body);
            }
        }
        w.into_bytes()
    }

    pub fn kind(&self) -> PacketKind {
        match self {
            Message::JoinGame(_) => PacketKind::JoinGame,
            Message::Respawn(_) => PacketKind::Respawn,
            Message::PositionLook(_) => PacketKind::PlayerPositionLook,
            Message::Chat(_) => PacketKind::Chat,
            Message::Disconnect(_) => PacketKind::Disconnect,
            Message::CustomPayload(_) => PacketKind::CustomPayload,
            Message::ResourcePackSend(_) => PacketKind::ResourcePackSend,
            Message::ChangeGameState(_) => PacketKind::ChangeGameState,
            Message::Entity(m) => m.kind,
            Message::AttachEntity(_) => PacketKind::AttachEntity,
            Message::CollectItem(_) => PacketKind::CollectItem,
            Message::DestroyEntities(_) => PacketKind::DestroyEntities,
            Message::Other { kind, .. } => *kind,
        }
    }
}

// =============================================================================
// Chat components
// =============================================================================

/// Flatten a JSON chat component into its unformatted text.
///
/// Input that is not valid JSON is returned unchanged.
pub fn plain_text(json: &str) -> String {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => {
            let mut out = String::new();
            flatten_component(&value, &mut out);
            out
        }
        Err(_) => json.to_string(),
    }
}

fn flatten_component(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => {
            for part in parts {
                flatten_component(part, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(Value::Array(extra)) = map.get("extra") {
                for part in extra {
                    flatten_component(part, out);
                }
            }
        }
        _ => {}
    }
}

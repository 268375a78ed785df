//! Clientbound play-state packet ids
//!
//! The recording stores packets exactly as the server sent them during the
//! play state, so the id table is closed: anything past
//! [`PacketKind::MAX_ID`] is a decode error.

use crate::error::DecodeError;

macro_rules! packet_kinds {
    ($($name:ident = $id:literal,)*) => {
        /// Every packet kind that can appear in a recording
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum PacketKind {
            $($name = $id,)*
        }

        impl PacketKind {
            /// All kinds in id order
            pub const ALL: &'static [PacketKind] = &[$(PacketKind::$name,)*];

            /// Look up a kind by its wire id
            pub fn from_id(id: i32) -> Result<Self, DecodeError> {
                match id {
                    $($id => Ok(PacketKind::$name),)*
                    _ => Err(DecodeError::UnknownPacketId(id)),
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(PacketKind::$name => stringify!($name),)*
                }
            }
        }
    };
}

packet_kinds! {
    KeepAlive = 0x00,
    JoinGame = 0x01,
    Chat = 0x02,
    TimeUpdate = 0x03,
    EntityEquipment = 0x04,
    SpawnPosition = 0x05,
    UpdateHealth = 0x06,
    Respawn = 0x07,
    PlayerPositionLook = 0x08,
    HeldItemChange = 0x09,
    UseBed = 0x0A,
    Animation = 0x0B,
    SpawnPlayer = 0x0C,
    CollectItem = 0x0D,
    SpawnObject = 0x0E,
    SpawnMob = 0x0F,
    SpawnPainting = 0x10,
    SpawnExperienceOrb = 0x11,
    EntityVelocity = 0x12,
    DestroyEntities = 0x13,
    EntityIdle = 0x14,
    EntityRelativeMove = 0x15,
    EntityLook = 0x16,
    EntityLookMove = 0x17,
    EntityTeleport = 0x18,
    EntityHeadLook = 0x19,
    EntityStatus = 0x1A,
    AttachEntity = 0x1B,
    EntityMetadata = 0x1C,
    EntityEffect = 0x1D,
    RemoveEntityEffect = 0x1E,
    SetExperience = 0x1F,
    EntityProperties = 0x20,
    ChunkData = 0x21,
    MultiBlockChange = 0x22,
    BlockChange = 0x23,
    BlockAction = 0x24,
    BlockBreakAnimation = 0x25,
    MapChunkBulk = 0x26,
    Explosion = 0x27,
    Effect = 0x28,
    SoundEffect = 0x29,
    Particles = 0x2A,
    ChangeGameState = 0x2B,
    SpawnGlobalEntity = 0x2C,
    OpenWindow = 0x2D,
    CloseWindow = 0x2E,
    SetSlot = 0x2F,
    WindowItems = 0x30,
    WindowProperty = 0x31,
    ConfirmTransaction = 0x32,
    UpdateSign = 0x33,
    Maps = 0x34,
    UpdateBlockEntity = 0x35,
    SignEditorOpen = 0x36,
    Statistics = 0x37,
    PlayerListItem = 0x38,
    PlayerAbilities = 0x39,
    TabComplete = 0x3A,
    ScoreboardObjective = 0x3B,
    UpdateScore = 0x3C,
    DisplayScoreboard = 0x3D,
    Teams = 0x3E,
    CustomPayload = 0x3F,
    Disconnect = 0x40,
    ServerDifficulty = 0x41,
    CombatEvent = 0x42,
    Camera = 0x43,
    WorldBorder = 0x44,
    Title = 0x45,
    SetCompression = 0x46,
    PlayerListHeaderFooter = 0x47,
    ResourcePackSend = 0x48,
    UpdateEntityNbt = 0x49,
}

/// Kinds that only describe the recording player's own client and UI
pub const DROPPED_KINDS: &[PacketKind] = &[
    PacketKind::UpdateHealth,
    PacketKind::OpenWindow,
    PacketKind::CloseWindow,
    PacketKind::SetSlot,
    PacketKind::WindowItems,
    PacketKind::SignEditorOpen,
    PacketKind::Statistics,
    PacketKind::SetExperience,
    PacketKind::Camera,
    PacketKind::PlayerAbilities,
    PacketKind::Title,
];

/// Kinds after which the viewer has to purge dead entities in sync mode
pub const LIFECYCLE_KINDS: &[PacketKind] = &[
    PacketKind::SpawnPlayer,
    PacketKind::SpawnObject,
    PacketKind::SpawnMob,
    PacketKind::SpawnGlobalEntity,
    PacketKind::SpawnPainting,
    PacketKind::SpawnExperienceOrb,
    PacketKind::DestroyEntities,
];

/// Kinds whose body starts with a VarInt entity id
pub const ENTITY_ADDRESSED_KINDS: &[PacketKind] = &[
    PacketKind::EntityEquipment,
    PacketKind::UseBed,
    PacketKind::Animation,
    PacketKind::SpawnPlayer,
    PacketKind::SpawnObject,
    PacketKind::SpawnMob,
    PacketKind::SpawnPainting,
    PacketKind::SpawnExperienceOrb,
    PacketKind::EntityVelocity,
    PacketKind::EntityIdle,
    PacketKind::EntityRelativeMove,
    PacketKind::EntityLook,
    PacketKind::EntityLookMove,
    PacketKind::EntityTeleport,
    PacketKind::EntityHeadLook,
    PacketKind::EntityMetadata,
    PacketKind::EntityEffect,
    PacketKind::RemoveEntityEffect,
    PacketKind::EntityProperties,
    PacketKind::SpawnGlobalEntity,
];

/// Object type of a firework rocket in spawn-object
pub const OBJECT_TYPE_FIREWORK: u8 = 76;

/// What the replay filter does with a kind before looking at its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Never delivered
    Drop,
    /// Delivered as recorded unless a field-level rule applies
    Inspect,
}

impl PacketKind {
    pub const MAX_ID: i32 = 0x49;

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn policy(self) -> Policy {
        if DROPPED_KINDS.contains(&self) {
            Policy::Drop
        } else {
            Policy::Inspect
        }
    }

    pub fn is_entity_addressed(self) -> bool {
        ENTITY_ADDRESSED_KINDS.contains(&self)
    }

    pub fn affects_entity_lifecycle(self) -> bool {
        LIFECYCLE_KINDS.contains(&self)
    }
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#04X})", self.name(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_dense() {
        assert_eq!(PacketKind::ALL.len() as i32, PacketKind::MAX_ID + 1);
        for (i, kind) in PacketKind::ALL.iter().enumerate() {
            assert_eq!(kind.id(), i as i32);
            assert_eq!(PacketKind::from_id(i as i32), Ok(*kind));
        }
    }

    #[test]
    fn test_unknown_ids() {
        assert_eq!(
            PacketKind::from_id(0x4A),
            Err(DecodeError::UnknownPacketId(0x4A))
        );
        assert_eq!(
            PacketKind::from_id(-1),
            Err(DecodeError::UnknownPacketId(-1))
        );
    }

    #[test]
    fn test_drop_policy() {
        assert_eq!(PacketKind::UpdateHealth.policy(), Policy::Drop);
        assert_eq!(PacketKind::Title.policy(), Policy::Drop);
        assert_eq!(PacketKind::Chat.policy(), Policy::Inspect);
        assert_eq!(DROPPED_KINDS.len(), 11);
    }

    #[test]
    fn test_display() {
        assert_eq!(PacketKind::Chat.to_string(), "Chat(0x02)");
        assert_eq!(PacketKind::ResourcePackSend.to_string(), "ResourcePackSend(0x48)");
    }
}

use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::authority::PeerId;
use crate::snapshot::{EntityId, Snapshot, SnapshotFlags};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x5245_504C;
pub const DEFAULT_PORT: u16 = 27016;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub sender: PeerId,
}

impl PacketHeader {
    pub fn new(sequence: u32, sender: PeerId) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            sender,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SnapshotPayload {
    pub position: [f32; 3],
    pub rotation: f32,
    pub velocity: [f32; 3],
    pub flags: u8,
    pub timestamp: f64,
}

impl From<&Snapshot> for SnapshotPayload {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            position: snapshot.position.into(),
            rotation: snapshot.rotation,
            velocity: snapshot.velocity.into(),
            flags: snapshot.flags().bits(),
            timestamp: snapshot.timestamp,
        }
    }
}

impl From<&SnapshotPayload> for Snapshot {
    fn from(payload: &SnapshotPayload) -> Self {
        let mut snapshot = Snapshot {
            position: Vec3::from(payload.position),
            rotation: payload.rotation,
            velocity: Vec3::from(payload.velocity),
            timestamp: payload.timestamp,
            ..Snapshot::default()
        };
        snapshot.set_flags(SnapshotFlags::from_bits_truncate(payload.flags));
        snapshot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityConfigPayload {
    pub class: u8,
    pub mode: u8,
    pub publish_interval_seconds: f64,
    pub smoothing_buffer_size: u32,
    pub interpolation_rate: f32,
}

/// Host-issued changes to the set of live entities.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum LifecycleEvent {
    Spawn {
        entity_id: EntityId,
        owner: PeerId,
        config: EntityConfigPayload,
        initial: SnapshotPayload,
    },
    Despawn {
        entity_id: EntityId,
    },
    OwnerChanged {
        entity_id: EntityId,
        owner: PeerId,
    },
}

impl LifecycleEvent {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Spawn { entity_id, .. }
            | Self::Despawn { entity_id }
            | Self::OwnerChanged { entity_id, .. } => *entity_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Despawn { .. } => "despawn",
            Self::OwnerChanged { .. } => "owner-changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ReplicationMessage {
    /// Owner → host, `HostWrite` entities: the host applies it to its store.
    Relay {
        entity_id: EntityId,
        snapshot: SnapshotPayload,
    },
    /// Owner → host for `OwnerWrite` submissions, host → peers for fan-out.
    Replicate {
        entity_id: EntityId,
        snapshot: SnapshotPayload,
    },
    /// Host → one guest, re-sent until acknowledged.
    Lifecycle {
        sequence: u32,
        event: LifecycleEvent,
    },
    LifecycleAck {
        sequence: u32,
    },
}

impl ReplicationMessage {
    pub fn relay(entity_id: EntityId, snapshot: &Snapshot) -> Self {
        Self::Relay {
            entity_id,
            snapshot: snapshot.into(),
        }
    }

    pub fn replicate(entity_id: EntityId, snapshot: &Snapshot) -> Self {
        Self::Replicate {
            entity_id,
            snapshot: snapshot.into(),
        }
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::Relay { entity_id, .. } | Self::Replicate { entity_id, .. } => Some(*entity_id),
            Self::Lifecycle { event, .. } => Some(event.entity_id()),
            Self::LifecycleAck { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Relay { .. } => "relay",
            Self::Replicate { .. } => "replicate",
            Self::Lifecycle { event, .. } => event.kind(),
            Self::LifecycleAck { .. } => "lifecycle-ack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: ReplicationMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("packet of {size} bytes exceeds the {max} byte limit", max = MAX_PACKET_SIZE)]
    TooLarge { size: usize },
    #[error("bad magic or protocol version")]
    InvalidHeader,
}

impl Packet {
    pub fn new(header: PacketHeader, payload: ReplicationMessage) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let data = self.serialize()?;
        if data.len() > MAX_PACKET_SIZE {
            return Err(PacketError::TooLarge { size: data.len() });
        }
        Ok(data)
    }

    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let packet = Self::deserialize(data)?;
        if !packet.header.is_valid() {
            return Err(PacketError::InvalidHeader);
        }
        Ok(packet)
    }
}

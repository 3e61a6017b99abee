use crate::authority::PeerId;
use crate::snapshot::EntityId;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    EntitySpawned {
        entity_id: EntityId,
        owner: PeerId,
        owned: bool,
    },
    EntityDespawned {
        entity_id: EntityId,
    },
    OwnershipChanged {
        entity_id: EntityId,
        previous: Option<PeerId>,
        owner: PeerId,
    },
    WriteRejected {
        entity_id: EntityId,
        from: PeerId,
        error: StoreError,
    },
    ChannelUnavailable {
        peer: PeerId,
    },
    Error {
        message: String,
    },
}

impl PeerEvent {
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            PeerEvent::EntitySpawned { entity_id, .. }
            | PeerEvent::EntityDespawned { entity_id }
            | PeerEvent::OwnershipChanged { entity_id, .. }
            | PeerEvent::WriteRejected { entity_id, .. } => Some(*entity_id),
            PeerEvent::ChannelUnavailable { .. } | PeerEvent::Error { .. } => None,
        }
    }
}

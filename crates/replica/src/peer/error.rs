use crate::authority::PeerId;
use crate::config::ConfigError;
use crate::snapshot::EntityId;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeerError {
    #[error("only the host may do this")]
    NotHost,
    #[error("{0} is not spawned on this peer")]
    UnknownEntity(EntityId),
    #[error("{entity} is owned by {owner:?}, not the local peer")]
    NotOwner {
        entity: EntityId,
        owner: Option<PeerId>,
    },
    #[error("transport belongs to {transport} but the session says {local}")]
    PeerMismatch { local: PeerId, transport: PeerId },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid entity config: {0}")]
    Config(#[from] ConfigError),
}

use crate::authority::{AuthorityMode, PeerId};
use crate::snapshot::EntityId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{caller} may not write {entity} under {mode}")]
    PermissionDenied {
        entity: EntityId,
        mode: AuthorityMode,
        caller: PeerId,
    },
    #[error("{0} is not spawned")]
    UnknownEntity(EntityId),
    #[error("{0} is already spawned")]
    AlreadySpawned(EntityId),
    #[error("stale write to {entity}: stored t={stored}, submitted t={submitted}")]
    StaleSnapshot {
        entity: EntityId,
        stored: f64,
        submitted: f64,
    },
}

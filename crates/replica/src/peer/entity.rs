use glam::Vec3;

use crate::config::EntityConfig;
use crate::publish::StatePublisher;
use crate::simulation::LocalSimulator;
use crate::smoothing::RemoteSmoother;
use crate::snapshot::{EntityId, LocalState, Snapshot};

/// Pose handed to the renderer for one entity this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    pub entity_id: EntityId,
    pub position: Vec3,
    pub rotation: f32,
    pub owned: bool,
}

pub(crate) enum EntityRole {
    Owned {
        publisher: StatePublisher,
        simulator: Option<Box<dyn LocalSimulator>>,
        local_state: LocalState,
    },
    Observed {
        smoother: RemoteSmoother,
    },
}

/// Per-entity pipeline state on one peer.
pub struct ReplicatedEntity {
    entity_id: EntityId,
    config: EntityConfig,
    pub(crate) role: EntityRole,
}

impl ReplicatedEntity {
    pub(crate) fn new(
        entity_id: EntityId,
        config: EntityConfig,
        owned: bool,
        current: &Snapshot,
    ) -> Self {
        let role = Self::role_for(entity_id, &config, owned, current);
        Self {
            entity_id,
            config,
            role,
        }
    }

    fn role_for(
        entity_id: EntityId,
        config: &EntityConfig,
        owned: bool,
        current: &Snapshot,
    ) -> EntityRole {
        if owned {
            EntityRole::Owned {
                publisher: StatePublisher::new(entity_id, config.publish_interval_seconds),
                simulator: None,
                local_state: LocalState::from(current),
            }
        } else {
            EntityRole::Observed {
                smoother: RemoteSmoother::new(
                    config.smoothing_buffer_size,
                    config.interpolation_rate,
                    current,
                ),
            }
        }
    }

    /// Swaps publisher and smoother when ownership moves to or from the local
    /// peer. Returns false when nothing changed.
    pub(crate) fn set_owned(&mut self, owned: bool, current: &Snapshot) -> bool {
        if self.is_owned() == owned {
            return false;
        }
        // New owners continue from what was on screen, new observers from the store.
        let seed = match &self.role {
            EntityRole::Observed { smoother } => Snapshot {
                position: smoother.displayed_position(),
                rotation: smoother.displayed_rotation(),
                ..*current
            },
            EntityRole::Owned { .. } => *current,
        };
        self.role = Self::role_for(self.entity_id, &self.config, owned, &seed);
        true
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.role, EntityRole::Owned { .. })
    }

    pub fn has_simulator(&self) -> bool {
        matches!(
            self.role,
            EntityRole::Owned {
                simulator: Some(_),
                ..
            }
        )
    }

    pub fn smoother(&self) -> Option<&RemoteSmoother> {
        match &self.role {
            EntityRole::Observed { smoother } => Some(smoother),
            EntityRole::Owned { .. } => None,
        }
    }

    pub fn presentation(&self) -> Presentation {
        let (position, rotation) = match &self.role {
            EntityRole::Owned { local_state, .. } => (local_state.position, local_state.rotation),
            EntityRole::Observed { smoother } => {
                (smoother.displayed_position(), smoother.displayed_rotation())
            }
        };
        Presentation {
            entity_id: self.entity_id,
            position,
            rotation,
            owned: self.is_owned(),
        }
    }
}

use crate::authority::{AuthorityMode, AuthorityResolver};
use crate::net::{ReplicationMessage, Transport, TransportError};
use crate::snapshot::{EntityId, LocalState};
use crate::store::{AuthoritativeStore, StoreError};

use super::throttle::RateLimiter;

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Throttled,
    NotOwner,
    Stored,
    Relayed,
    Rejected(StoreError),
    ChannelUnavailable,
}

/// Samples one owned entity at a bounded rate and submits it under the
/// entity's authority mode.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    entity_id: EntityId,
    limiter: RateLimiter,
}

impl StatePublisher {
    pub fn new(entity_id: EntityId, publish_interval_seconds: f64) -> Self {
        Self {
            entity_id,
            limiter: RateLimiter::new(publish_interval_seconds),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn last_publish(&self) -> Option<f64> {
        self.limiter.last_publish()
    }

    pub fn tick<R: AuthorityResolver + ?Sized>(
        &mut self,
        now: f64,
        state: &LocalState,
        resolver: &R,
        store: &mut AuthoritativeStore,
        transport: &mut dyn Transport,
    ) -> PublishOutcome {
        let entity_id = self.entity_id;
        if !resolver.is_local_owner(entity_id) {
            return PublishOutcome::NotOwner;
        }
        let Some(mode) = store.mode(entity_id) else {
            return PublishOutcome::Rejected(StoreError::UnknownEntity(entity_id));
        };
        // A failed send still consumes the slot; the next attempt waits a full interval.
        if !self.limiter.try_acquire(now) {
            return PublishOutcome::Throttled;
        }

        let snapshot = state.snapshot_at(now);
        let role = resolver.local_role(entity_id);

        let message = match (mode, resolver.is_authoritative_host()) {
            (AuthorityMode::HostWrite, false) => ReplicationMessage::relay(entity_id, &snapshot),
            (AuthorityMode::OwnerWrite, false) => {
                if let Err(err) = store.set(entity_id, snapshot, role) {
                    return PublishOutcome::Rejected(err);
                }
                ReplicationMessage::replicate(entity_id, &snapshot)
            }
            (_, true) => {
                return match store.set(entity_id, snapshot, role) {
                    Ok(()) => PublishOutcome::Stored,
                    Err(err) => PublishOutcome::Rejected(err),
                };
            }
        };

        let host = resolver.host();
        match transport.send(host, &message) {
            Ok(()) => PublishOutcome::Relayed,
            Err(TransportError::ChannelUnavailable { .. }) => {
                log::warn!("{}: channel to host {} unavailable", entity_id, host);
                PublishOutcome::ChannelUnavailable
            }
            Err(err) => {
                log::warn!("{}: {} to {} failed: {}", entity_id, message.kind(), host, err);
                PublishOutcome::ChannelUnavailable
            }
        }
    }
}

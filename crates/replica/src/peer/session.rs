use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use crate::authority::{AuthorityMode, AuthorityResolver, PeerId, SessionTopology};
use crate::config::EntityConfig;
use crate::net::{LifecycleEvent, NetworkStats, ReplicationMessage, Transport, TransportError};
use crate::publish::PublishOutcome;
use crate::simulation::{Clock, LocalSimulator};
use crate::snapshot::{EntityId, Snapshot};
use crate::store::{AuthoritativeStore, StoreError, TimestampPolicy};

use super::entity::{EntityRole, Presentation, ReplicatedEntity};
use super::error::PeerError;
use super::events::PeerEvent;
use super::lifecycle::{Delivery, LifecycleInbox, LifecycleOutbox};

/// One participant in a replication session.
pub struct Peer {
    topology: SessionTopology,
    store: AuthoritativeStore,
    transport: Box<dyn Transport>,
    clock: Rc<dyn Clock>,
    entities: BTreeMap<EntityId, ReplicatedEntity>,
    events: VecDeque<PeerEvent>,
    outbox: LifecycleOutbox,
    inbox: LifecycleInbox,
    ack_due: bool,
}

impl Peer {
    pub fn new(
        topology: SessionTopology,
        transport: Box<dyn Transport>,
        clock: Rc<dyn Clock>,
        policy: TimestampPolicy,
    ) -> Result<Self, PeerError> {
        if transport.local_peer() != topology.local_peer() {
            return Err(PeerError::PeerMismatch {
                local: topology.local_peer(),
                transport: transport.local_peer(),
            });
        }

        Ok(Self {
            topology,
            store: AuthoritativeStore::with_policy(policy),
            transport,
            clock,
            entities: BTreeMap::new(),
            events: VecDeque::new(),
            outbox: LifecycleOutbox::default(),
            inbox: LifecycleInbox::default(),
            ack_due: false,
        })
    }

    pub fn local_peer(&self) -> PeerId {
        self.topology.local_peer()
    }

    pub fn is_host(&self) -> bool {
        self.topology.is_authoritative_host()
    }

    pub fn topology(&self) -> &SessionTopology {
        &self.topology
    }

    pub fn store(&self) -> &AuthoritativeStore {
        &self.store
    }

    pub fn entity(&self, entity_id: EntityId) -> Option<&ReplicatedEntity> {
        self.entities.get(&entity_id)
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.transport.stats()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = PeerEvent> + '_ {
        self.events.drain(..)
    }

    /// Registers a newly connected peer. On the host, the newcomer is told
    /// about every live entity.
    pub fn connect_peer(&mut self, peer: PeerId) {
        if !self.topology.join(peer) || !self.is_host() {
            return;
        }
        let announcements: Vec<LifecycleEvent> = self
            .entities
            .values()
            .filter_map(|entity| self.spawn_event(entity))
            .collect();
        for event in announcements {
            self.outbox.push(peer, event);
        }
        self.flush_lifecycle();
    }

    pub fn disconnect_peer(&mut self, peer: PeerId) -> bool {
        self.outbox.forget(peer);
        self.topology.leave(peer)
    }

    pub fn pending_lifecycle(&self, guest: PeerId) -> usize {
        self.outbox.pending_for(guest)
    }

    pub fn spawn(
        &mut self,
        entity_id: EntityId,
        owner: PeerId,
        config: EntityConfig,
        initial: Snapshot,
    ) -> Result<(), PeerError> {
        if !self.is_host() {
            return Err(PeerError::NotHost);
        }
        config.validate()?;
        self.store.spawn(entity_id, config.authority_mode, initial)?;
        self.topology.assign_owner(entity_id, owner);

        let owned = owner == self.local_peer();
        let entity = ReplicatedEntity::new(entity_id, config, owned, &initial);
        let event = self.spawn_event(&entity);
        self.entities.insert(entity_id, entity);
        log::info!("spawned {} owned by {}", entity_id, owner);

        if let Some(event) = event {
            self.announce(event);
        }
        self.events.push_back(PeerEvent::EntitySpawned {
            entity_id,
            owner,
            owned,
        });
        Ok(())
    }

    pub fn despawn(&mut self, entity_id: EntityId) -> Result<(), PeerError> {
        if !self.is_host() {
            return Err(PeerError::NotHost);
        }
        if !self.release_entity(entity_id) {
            return Err(PeerError::UnknownEntity(entity_id));
        }
        self.announce(LifecycleEvent::Despawn { entity_id });
        Ok(())
    }

    pub fn reassign_owner(&mut self, entity_id: EntityId, owner: PeerId) -> Result<(), PeerError> {
        if !self.is_host() {
            return Err(PeerError::NotHost);
        }
        if !self.entities.contains_key(&entity_id) {
            return Err(PeerError::UnknownEntity(entity_id));
        }
        self.apply_owner(entity_id, owner);
        self.announce(LifecycleEvent::OwnerChanged { entity_id, owner });
        Ok(())
    }

    pub fn attach_simulator(
        &mut self,
        entity_id: EntityId,
        simulator: Box<dyn LocalSimulator>,
    ) -> Result<(), PeerError> {
        let owner = self.topology.owner_of(entity_id);
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or(PeerError::UnknownEntity(entity_id))?;
        match &mut entity.role {
            EntityRole::Owned {
                simulator: slot,
                local_state,
                ..
            } => {
                *local_state = simulator.state();
                *slot = Some(simulator);
                Ok(())
            }
            EntityRole::Observed { .. } => Err(PeerError::NotOwner {
                entity: entity_id,
                owner,
            }),
        }
    }

    pub fn detach_simulator(&mut self, entity_id: EntityId) -> Option<Box<dyn LocalSimulator>> {
        match &mut self.entities.get_mut(&entity_id)?.role {
            EntityRole::Owned { simulator, .. } => simulator.take(),
            EntityRole::Observed { .. } => None,
        }
    }

    /// Runs one frame: simulate, publish, transfer, smooth, present.
    pub fn update(&mut self, delta_time: f32) -> Vec<Presentation> {
        self.simulate(delta_time);
        self.publish();
        self.transfer();
        self.smooth(delta_time);
        self.present()
    }

    pub fn present(&self) -> Vec<Presentation> {
        self.entities
            .values()
            .map(ReplicatedEntity::presentation)
            .collect()
    }

    fn simulate(&mut self, delta_time: f32) {
        for entity in self.entities.values_mut() {
            if let EntityRole::Owned {
                simulator: Some(simulator),
                local_state,
                ..
            } = &mut entity.role
            {
                *local_state = simulator.step(delta_time);
            }
        }
    }

    fn publish(&mut self) {
        let now = self.clock.now();
        let local = self.topology.local_peer();
        let host = self.topology.host();

        for (&entity_id, entity) in self.entities.iter_mut() {
            let EntityRole::Owned {
                publisher,
                local_state,
                ..
            } = &mut entity.role
            else {
                continue;
            };

            match publisher.tick(
                now,
                local_state,
                &self.topology,
                &mut self.store,
                self.transport.as_mut(),
            ) {
                PublishOutcome::Rejected(error) => {
                    log::warn!("{}: local write rejected: {}", entity_id, error);
                    self.events.push_back(PeerEvent::WriteRejected {
                        entity_id,
                        from: local,
                        error,
                    });
                }
                PublishOutcome::ChannelUnavailable => {
                    self.events
                        .push_back(PeerEvent::ChannelUnavailable { peer: host });
                }
                PublishOutcome::Throttled
                | PublishOutcome::NotOwner
                | PublishOutcome::Stored
                | PublishOutcome::Relayed => {}
            }
        }
    }

    fn transfer(&mut self) {
        match self.transport.receive() {
            Ok(messages) => {
                for (from, message) in messages {
                    self.handle_message(from, message);
                }
            }
            Err(err) => {
                log::warn!("receive failed: {}", err);
                self.events.push_back(PeerEvent::Error {
                    message: err.to_string(),
                });
            }
        }

        if self.is_host() {
            self.flush_lifecycle();
            self.fan_out();
        } else if self.ack_due {
            self.acknowledge_lifecycle();
        }
    }

    fn smooth(&mut self, delta_time: f32) {
        for (&entity_id, entity) in self.entities.iter_mut() {
            if let EntityRole::Observed { smoother } = &mut entity.role {
                match self.store.get(entity_id) {
                    Ok(latest) => {
                        smoother.update(&latest, delta_time);
                    }
                    Err(err) => log::debug!("{}: nothing to smooth: {}", entity_id, err),
                }
            }
        }
    }

    fn handle_message(&mut self, from: PeerId, message: ReplicationMessage) {
        log::trace!("{} from {}", message.kind(), from);

        match message {
            ReplicationMessage::Relay {
                entity_id,
                snapshot,
            } => {
                if !self.is_host() {
                    log::debug!("ignoring relay from {}: not the host", from);
                    return;
                }
                let result = self.accept_relay(from, entity_id, Snapshot::from(&snapshot));
                self.record_write(entity_id, from, result);
            }
            ReplicationMessage::Replicate {
                entity_id,
                snapshot,
            } => {
                let snapshot = Snapshot::from(&snapshot);
                let sender = self.topology.role_of(from, entity_id);
                let result = if self.is_host() {
                    self.store.set(entity_id, snapshot, sender)
                } else {
                    self.store.mirror(entity_id, snapshot, sender)
                };
                self.record_write(entity_id, from, result);
            }
            ReplicationMessage::Lifecycle { sequence, event } => {
                if !self.from_host(from) {
                    return;
                }
                self.ack_due = true;
                match self.inbox.accept(sequence) {
                    Delivery::Apply => self.apply_lifecycle(from, event),
                    Delivery::Duplicate => {}
                    Delivery::Early => {
                        log::debug!("{} #{} arrived early, waiting for resend", event.kind(), sequence);
                    }
                }
            }
            ReplicationMessage::LifecycleAck { sequence } => {
                if self.is_host() {
                    self.outbox.ack_up_to(from, sequence);
                }
            }
        }
    }

    fn apply_lifecycle(&mut self, from: PeerId, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Spawn {
                entity_id,
                owner,
                config,
                initial,
            } => match EntityConfig::from_wire(&config) {
                Ok(config) => self.adopt_entity(entity_id, owner, config, Snapshot::from(&initial)),
                Err(err) => {
                    log::warn!("{}: bad spawn config from {}: {}", entity_id, from, err);
                    self.events.push_back(PeerEvent::Error {
                        message: format!("{}: {}", entity_id, err),
                    });
                }
            },
            LifecycleEvent::Despawn { entity_id } => {
                self.release_entity(entity_id);
            }
            LifecycleEvent::OwnerChanged { entity_id, owner } => {
                if self.entities.contains_key(&entity_id) {
                    self.apply_owner(entity_id, owner);
                }
            }
        }
    }

    fn from_host(&self, from: PeerId) -> bool {
        if self.is_host() || from != self.topology.host() {
            log::debug!("ignoring lifecycle message from {}", from);
            return false;
        }
        true
    }

    fn accept_relay(
        &mut self,
        from: PeerId,
        entity_id: EntityId,
        snapshot: Snapshot,
    ) -> Result<(), StoreError> {
        let mode = self
            .store
            .mode(entity_id)
            .ok_or(StoreError::UnknownEntity(entity_id))?;
        if !self.topology.role_of(from, entity_id).is_owner {
            return Err(StoreError::PermissionDenied {
                entity: entity_id,
                mode,
                caller: from,
            });
        }
        let host_role = self.topology.local_role(entity_id);
        self.store.set(entity_id, snapshot, host_role)
    }

    fn record_write(&mut self, entity_id: EntityId, from: PeerId, result: Result<(), StoreError>) {
        let Err(error) = result else { return };
        match error {
            StoreError::UnknownEntity(_) => {
                log::debug!("{} from {} refers to an unknown entity", entity_id, from);
            }
            StoreError::StaleSnapshot { .. } => {
                log::debug!("{}: dropped out-of-order write from {}: {}", entity_id, from, error);
            }
            error => {
                log::warn!("{}: write from {} rejected: {}", entity_id, from, error);
                self.events.push_back(PeerEvent::WriteRejected {
                    entity_id,
                    from,
                    error,
                });
            }
        }
    }

    fn adopt_entity(
        &mut self,
        entity_id: EntityId,
        owner: PeerId,
        config: EntityConfig,
        initial: Snapshot,
    ) {
        if self.entities.contains_key(&entity_id) {
            log::debug!("{} already known, ignoring repeated spawn", entity_id);
            return;
        }
        if let Err(err) = self.store.spawn(entity_id, config.authority_mode, initial) {
            log::warn!("{}: {}", entity_id, err);
            return;
        }
        self.topology.assign_owner(entity_id, owner);

        let owned = owner == self.local_peer();
        self.entities
            .insert(entity_id, ReplicatedEntity::new(entity_id, config, owned, &initial));
        log::info!("{} spawned by host, owner {}", entity_id, owner);
        self.events.push_back(PeerEvent::EntitySpawned {
            entity_id,
            owner,
            owned,
        });
    }

    fn apply_owner(&mut self, entity_id: EntityId, owner: PeerId) {
        let previous = self.topology.assign_owner(entity_id, owner);
        if previous == Some(owner) {
            return;
        }
        let current = self.store.get(entity_id).unwrap_or_default();
        let owned = owner == self.local_peer();
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.set_owned(owned, &current);
        }
        log::info!("{} now owned by {}", entity_id, owner);
        self.events.push_back(PeerEvent::OwnershipChanged {
            entity_id,
            previous,
            owner,
        });
    }

    fn release_entity(&mut self, entity_id: EntityId) -> bool {
        if self.entities.remove(&entity_id).is_none() {
            return false;
        }
        self.store.despawn(entity_id);
        self.topology.release(entity_id);
        log::info!("despawned {}", entity_id);
        self.events
            .push_back(PeerEvent::EntityDespawned { entity_id });
        true
    }

    fn spawn_event(&self, entity: &ReplicatedEntity) -> Option<LifecycleEvent> {
        let entity_id = entity.entity_id();
        let owner = self.topology.owner_of(entity_id)?;
        let initial = self.store.get(entity_id).ok()?;
        Some(LifecycleEvent::Spawn {
            entity_id,
            owner,
            config: entity.config().to_wire(),
            initial: (&initial).into(),
        })
    }

    /// Host side: pushes every entry accepted since the last frame to all
    /// peers. `OwnerWrite` owners already hold their own value and are skipped.
    fn fan_out(&mut self) {
        let dirty = self.store.drain_dirty();
        if dirty.is_empty() {
            return;
        }
        let peers: Vec<PeerId> = self.topology.remote_peers().collect();
        let mut unavailable = BTreeSet::new();

        for (entity_id, snapshot) in dirty {
            let skip = match self.store.mode(entity_id) {
                Some(AuthorityMode::OwnerWrite) => self.topology.owner_of(entity_id),
                _ => None,
            };
            let message = ReplicationMessage::replicate(entity_id, &snapshot);
            for &peer in &peers {
                if Some(peer) == skip || unavailable.contains(&peer) {
                    continue;
                }
                if let Err(err) = self.transport.send(peer, &message) {
                    log::debug!("fan-out of {} to {} failed: {}", entity_id, peer, err);
                    unavailable.insert(peer);
                }
            }
        }

        for peer in unavailable {
            self.events
                .push_back(PeerEvent::ChannelUnavailable { peer });
        }
    }

    fn announce(&mut self, event: LifecycleEvent) {
        let peers: Vec<PeerId> = self.topology.remote_peers().collect();
        for peer in peers {
            self.outbox.push(peer, event.clone());
        }
        self.flush_lifecycle();
    }

    /// Host side: sends lifecycle messages that are new or due for a resend.
    /// Re-sent spawns carry the current snapshot rather than the one at spawn.
    fn flush_lifecycle(&mut self) {
        let mut unavailable = BTreeSet::new();
        for (peer, mut message) in self.outbox.due(self.clock.now()) {
            if unavailable.contains(&peer) {
                continue;
            }
            if let ReplicationMessage::Lifecycle {
                event:
                    LifecycleEvent::Spawn {
                        entity_id, initial, ..
                    },
                ..
            } = &mut message
            {
                if let Ok(current) = self.store.get(*entity_id) {
                    *initial = (&current).into();
                }
            }

            match self.transport.send(peer, &message) {
                Ok(()) => {}
                Err(TransportError::ChannelUnavailable { .. }) => {
                    log::debug!("{} to {} deferred: channel unavailable", message.kind(), peer);
                    unavailable.insert(peer);
                }
                Err(err) => {
                    log::warn!("{} to {} failed: {}", message.kind(), peer, err);
                    unavailable.insert(peer);
                }
            }
        }

        for peer in unavailable {
            self.events
                .push_back(PeerEvent::ChannelUnavailable { peer });
        }
    }

    fn acknowledge_lifecycle(&mut self) {
        let Some(sequence) = self.inbox.acknowledged() else {
            return;
        };
        let host = self.topology.host();
        match self.transport.send(host, &ReplicationMessage::LifecycleAck { sequence }) {
            Ok(()) => self.ack_due = false,
            Err(err) => log::debug!("lifecycle ack to {} failed: {}", host, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::config::ConfigError;
    use crate::net::SimulatedNetwork;
    use crate::simulation::{ManualClock, StaticSimulator};
    use crate::snapshot::LocalState;

    const HOST: PeerId = PeerId(1);
    const GUEST: PeerId = PeerId(2);
    const ENTITY: EntityId = EntityId(10);

    fn pair() -> (Rc<ManualClock>, Peer, Peer) {
        pair_with(TimestampPolicy::Unchecked)
    }

    fn pair_with(policy: TimestampPolicy) -> (Rc<ManualClock>, Peer, Peer) {
        let clock = Rc::new(ManualClock::new(0.0));
        let network = SimulatedNetwork::new(clock.clone(), 3);
        let host = Peer::new(
            SessionTopology::with_peers(HOST, HOST, [GUEST]),
            Box::new(network.connect(HOST)),
            clock.clone(),
            policy,
        )
        .unwrap();
        let guest = Peer::new(
            SessionTopology::new(GUEST, HOST),
            Box::new(network.connect(GUEST)),
            clock.clone(),
            policy,
        )
        .unwrap();
        (clock, host, guest)
    }

    #[test]
    fn transport_must_match_topology() {
        let clock = Rc::new(ManualClock::new(0.0));
        let network = SimulatedNetwork::new(clock.clone(), 3);
        let result = Peer::new(
            SessionTopology::new(GUEST, HOST),
            Box::new(network.connect(HOST)),
            clock,
            TimestampPolicy::Unchecked,
        );
        assert!(matches!(result, Err(PeerError::PeerMismatch { .. })));
    }

    #[test]
    fn only_host_manages_lifecycle() {
        let (_clock, mut host, mut guest) = pair();
        assert_eq!(
            guest.spawn(ENTITY, GUEST, EntityConfig::primary(), Snapshot::default()),
            Err(PeerError::NotHost)
        );
        assert_eq!(guest.despawn(ENTITY), Err(PeerError::NotHost));

        let mut bad = EntityConfig::primary();
        bad.smoothing_buffer_size = 0;
        assert!(matches!(
            host.spawn(ENTITY, GUEST, bad, Snapshot::default()),
            Err(PeerError::Config(_))
        ));
        assert_eq!(host.reassign_owner(ENTITY, HOST), Err(PeerError::UnknownEntity(ENTITY)));

        let mut huge = EntityConfig::primary();
        huge.smoothing_buffer_size = usize::MAX;
        assert_eq!(
            host.spawn(ENTITY, GUEST, huge, Snapshot::default()),
            Err(PeerError::Config(ConfigError::SmoothingBufferTooLarge(usize::MAX)))
        );
    }

    #[test]
    fn oversized_spawn_from_wire_is_refused() {
        let (_clock, mut host, mut guest) = pair();
        let mut config = EntityConfig::primary().to_wire();
        config.smoothing_buffer_size = u32::MAX;
        let spawn = ReplicationMessage::Lifecycle {
            sequence: 0,
            event: LifecycleEvent::Spawn {
                entity_id: ENTITY,
                owner: HOST,
                config,
                initial: (&Snapshot::default()).into(),
            },
        };
        host.transport.send(GUEST, &spawn).unwrap();
        guest.update(1.0 / 60.0);

        assert!(guest.entity(ENTITY).is_none());
        assert!(guest
            .drain_events()
            .any(|event| matches!(event, PeerEvent::Error { .. })));
    }

    #[test]
    fn spawn_reaches_guest_with_ownership() {
        let (_clock, mut host, mut guest) = pair();
        host.spawn(ENTITY, GUEST, EntityConfig::secondary(), Snapshot::default())
            .unwrap();

        guest.update(1.0 / 60.0);
        let events: Vec<PeerEvent> = guest.drain_events().collect();
        assert!(events.contains(&PeerEvent::EntitySpawned {
            entity_id: ENTITY,
            owner: GUEST,
            owned: true,
        }));
        assert!(guest.entity(ENTITY).is_some_and(ReplicatedEntity::is_owned));
        assert!(!host.entity(ENTITY).is_some_and(ReplicatedEntity::is_owned));
        assert_eq!(guest.store().mode(ENTITY), Some(AuthorityMode::OwnerWrite));
    }

    #[test]
    fn relay_from_non_owner_is_rejected() {
        let (_clock, mut host, mut guest) = pair();
        host.spawn(ENTITY, HOST, EntityConfig::primary(), Snapshot::default())
            .unwrap();
        guest.update(0.0);

        let forged = Snapshot::at_rest(Vec3::new(99.0, 0.0, 0.0), 0.0);
        guest
            .transport
            .send(HOST, &ReplicationMessage::relay(ENTITY, &forged))
            .unwrap();
        host.update(0.0);

        assert_ne!(host.store().get(ENTITY).unwrap().position.x, 99.0);
        assert!(host.drain_events().any(|event| matches!(
            event,
            PeerEvent::WriteRejected {
                from: GUEST,
                error: StoreError::PermissionDenied { .. },
                ..
            }
        )));
    }

    #[test]
    fn reordered_snapshot_is_dropped_quietly() {
        let (_clock, mut host, mut guest) = pair_with(TimestampPolicy::RejectStale);
        host.spawn(ENTITY, HOST, EntityConfig::primary(), Snapshot::default())
            .unwrap();
        guest.update(0.0);
        guest.drain_events().for_each(drop);

        let at = |timestamp| Snapshot {
            timestamp,
            ..Snapshot::default()
        };
        for timestamp in [2.0, 1.0] {
            host.transport
                .send(GUEST, &ReplicationMessage::replicate(ENTITY, &at(timestamp)))
                .unwrap();
        }
        guest.update(0.0);

        assert_eq!(guest.store().get(ENTITY).unwrap().timestamp, 2.0);
        assert!(!guest
            .drain_events()
            .any(|event| matches!(event, PeerEvent::WriteRejected { .. })));
    }

    #[test]
    fn attach_requires_ownership() {
        let (_clock, mut host, _guest) = pair();
        host.spawn(ENTITY, GUEST, EntityConfig::primary(), Snapshot::default())
            .unwrap();
        let simulator = Box::new(StaticSimulator::new(LocalState::default()));
        assert!(matches!(
            host.attach_simulator(ENTITY, simulator),
            Err(PeerError::NotOwner { .. })
        ));
    }

    #[test]
    fn reassignment_swaps_roles() {
        let (_clock, mut host, mut guest) = pair();
        host.spawn(ENTITY, HOST, EntityConfig::secondary(), Snapshot::default())
            .unwrap();
        guest.update(0.0);
        assert!(!guest.entity(ENTITY).is_some_and(ReplicatedEntity::is_owned));

        host.reassign_owner(ENTITY, GUEST).unwrap();
        guest.update(0.0);

        assert!(guest.entity(ENTITY).is_some_and(ReplicatedEntity::is_owned));
        assert!(!host.entity(ENTITY).is_some_and(ReplicatedEntity::is_owned));
        assert!(guest.drain_events().any(|event| matches!(
            event,
            PeerEvent::OwnershipChanged {
                previous: Some(HOST),
                owner: GUEST,
                ..
            }
        )));
    }
}

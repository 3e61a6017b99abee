use std::collections::{BTreeSet, HashMap};

use crate::snapshot::EntityId;

use super::mode::{CallerRole, PeerId};

/// Ownership and host-role predicates supplied by the session layer.
pub trait AuthorityResolver {
    fn local_peer(&self) -> PeerId;

    fn host(&self) -> PeerId;

    fn owner_of(&self, entity_id: EntityId) -> Option<PeerId>;

    fn is_authoritative_host(&self) -> bool {
        self.local_peer() == self.host()
    }

    fn is_local_owner(&self, entity_id: EntityId) -> bool {
        self.owner_of(entity_id) == Some(self.local_peer())
    }

    fn role_of(&self, peer: PeerId, entity_id: EntityId) -> CallerRole {
        CallerRole::new(
            peer,
            peer == self.host(),
            self.owner_of(entity_id) == Some(peer),
        )
    }

    fn local_role(&self, entity_id: EntityId) -> CallerRole {
        self.role_of(self.local_peer(), entity_id)
    }
}

/// One peer's view of the session: who it is, who hosts, who else is
/// connected and who owns what.
#[derive(Debug, Clone)]
pub struct SessionTopology {
    local: PeerId,
    host: PeerId,
    peers: BTreeSet<PeerId>,
    owners: HashMap<EntityId, PeerId>,
}

impl SessionTopology {
    pub fn new(local: PeerId, host: PeerId) -> Self {
        let mut peers = BTreeSet::new();
        peers.insert(local);
        peers.insert(host);
        Self {
            local,
            host,
            peers,
            owners: HashMap::new(),
        }
    }

    pub fn with_peers(local: PeerId, host: PeerId, peers: impl IntoIterator<Item = PeerId>) -> Self {
        let mut topology = Self::new(local, host);
        topology.peers.extend(peers);
        topology
    }

    pub fn join(&mut self, peer: PeerId) -> bool {
        self.peers.insert(peer)
    }

    pub fn leave(&mut self, peer: PeerId) -> bool {
        if peer == self.local || peer == self.host {
            return false;
        }
        self.peers.remove(&peer)
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.iter().copied()
    }

    pub fn remote_peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.iter().copied().filter(move |&p| p != self.local)
    }

    pub fn assign_owner(&mut self, entity_id: EntityId, owner: PeerId) -> Option<PeerId> {
        self.peers.insert(owner);
        self.owners.insert(entity_id, owner)
    }

    pub fn release(&mut self, entity_id: EntityId) -> Option<PeerId> {
        self.owners.remove(&entity_id)
    }

    pub fn owned_by(&self, peer: PeerId) -> impl Iterator<Item = EntityId> + '_ {
        self.owners
            .iter()
            .filter(move |&(_, &owner)| owner == peer)
            .map(|(&id, _)| id)
    }
}

impl AuthorityResolver for SessionTopology {
    fn local_peer(&self) -> PeerId {
        self.local
    }

    fn host(&self) -> PeerId {
        self.host
    }

    fn owner_of(&self, entity_id: EntityId) -> Option<PeerId> {
        self.owners.get(&entity_id).copied()
    }
}

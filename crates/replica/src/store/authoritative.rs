use std::collections::HashMap;

use crate::authority::{AuthorityMode, CallerRole};
use crate::snapshot::{EntityId, Snapshot};

use super::error::StoreError;

/// Whether a permitted write may replace a newer stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TimestampPolicy {
    #[default]
    Unchecked,
    RejectStale,
}

#[derive(Debug, Clone)]
struct StoreEntry {
    mode: AuthorityMode,
    snapshot: Snapshot,
    written: bool,
    dirty: bool,
}

/// Latest known snapshot per entity, one writer per entity.
#[derive(Debug, Default)]
pub struct AuthoritativeStore {
    entries: HashMap<EntityId, StoreEntry>,
    policy: TimestampPolicy,
}

impl AuthoritativeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: TimestampPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> TimestampPolicy {
        self.policy
    }

    pub fn spawn(
        &mut self,
        entity_id: EntityId,
        mode: AuthorityMode,
        initial: Snapshot,
    ) -> Result<(), StoreError> {
        if self.entries.contains_key(&entity_id) {
            return Err(StoreError::AlreadySpawned(entity_id));
        }
        self.entries.insert(
            entity_id,
            StoreEntry {
                mode,
                snapshot: initial,
                written: false,
                dirty: false,
            },
        );
        Ok(())
    }

    pub fn despawn(&mut self, entity_id: EntityId) -> Option<Snapshot> {
        self.entries.remove(&entity_id).map(|entry| entry.snapshot)
    }

    /// Latest snapshot, or the spawn value if nothing has been written yet.
    pub fn get(&self, entity_id: EntityId) -> Result<Snapshot, StoreError> {
        self.entries
            .get(&entity_id)
            .map(|entry| entry.snapshot)
            .ok_or(StoreError::UnknownEntity(entity_id))
    }

    pub fn set(
        &mut self,
        entity_id: EntityId,
        snapshot: Snapshot,
        caller: CallerRole,
    ) -> Result<(), StoreError> {
        let policy = self.policy;
        let entry = self
            .entries
            .get_mut(&entity_id)
            .ok_or(StoreError::UnknownEntity(entity_id))?;

        if !entry.mode.permits(caller) {
            return Err(StoreError::PermissionDenied {
                entity: entity_id,
                mode: entry.mode,
                caller: caller.peer,
            });
        }

        Self::write(entity_id, entry, snapshot, policy)?;
        entry.dirty = true;
        Ok(())
    }

    /// Applies a value the host has already accepted and is now fanning out.
    pub fn mirror(
        &mut self,
        entity_id: EntityId,
        snapshot: Snapshot,
        sender: CallerRole,
    ) -> Result<(), StoreError> {
        let policy = self.policy;
        let entry = self
            .entries
            .get_mut(&entity_id)
            .ok_or(StoreError::UnknownEntity(entity_id))?;

        if !sender.is_host {
            return Err(StoreError::PermissionDenied {
                entity: entity_id,
                mode: entry.mode,
                caller: sender.peer,
            });
        }

        Self::write(entity_id, entry, snapshot, policy)
    }

    fn write(
        entity_id: EntityId,
        entry: &mut StoreEntry,
        snapshot: Snapshot,
        policy: TimestampPolicy,
    ) -> Result<(), StoreError> {
        if policy == TimestampPolicy::RejectStale
            && entry.written
            && snapshot.timestamp < entry.snapshot.timestamp
        {
            return Err(StoreError::StaleSnapshot {
                entity: entity_id,
                stored: entry.snapshot.timestamp,
                submitted: snapshot.timestamp,
            });
        }
        entry.snapshot = snapshot;
        entry.written = true;
        Ok(())
    }

    pub fn drain_dirty(&mut self) -> Vec<(EntityId, Snapshot)> {
        let mut dirty: Vec<(EntityId, Snapshot)> = self
            .entries
            .iter_mut()
            .filter(|(_, entry)| entry.dirty)
            .map(|(&id, entry)| {
                entry.dirty = false;
                (id, entry.snapshot)
            })
            .collect();
        dirty.sort_by_key(|(id, _)| *id);
        dirty
    }

    pub fn mode(&self, entity_id: EntityId) -> Option<AuthorityMode> {
        self.entries.get(&entity_id).map(|entry| entry.mode)
    }

    pub fn is_written(&self, entity_id: EntityId) -> bool {
        self.entries.get(&entity_id).is_some_and(|entry| entry.written)
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.entries.contains_key(&entity_id)
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::authority::PeerId;

    const ENTITY: EntityId = EntityId(7);

    fn host() -> CallerRole {
        CallerRole::new(PeerId(1), true, false)
    }

    fn owner() -> CallerRole {
        CallerRole::new(PeerId(2), false, true)
    }

    fn stranger() -> CallerRole {
        CallerRole::new(PeerId(3), false, false)
    }

    fn snapshot(x: f32, timestamp: f64) -> Snapshot {
        Snapshot {
            position: Vec3::new(x, 0.0, 0.0),
            timestamp,
            ..Snapshot::default()
        }
    }

    #[test]
    fn unwritten_entity_reads_default() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::HostWrite, Snapshot::default()).unwrap();

        assert_eq!(store.get(ENTITY).unwrap(), Snapshot::default());
        assert!(!store.is_written(ENTITY));
    }

    #[test]
    fn host_write_rejects_non_host() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::HostWrite, Snapshot::default()).unwrap();

        let err = store.set(ENTITY, snapshot(5.0, 1.0), owner()).unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { caller: PeerId(2), .. }));
        assert!(store.set(ENTITY, snapshot(6.0, 1.0), stranger()).is_err());
        assert_eq!(store.get(ENTITY).unwrap(), Snapshot::default());

        store.set(ENTITY, snapshot(5.0, 1.0), host()).unwrap();
        assert_eq!(store.get(ENTITY).unwrap().position.x, 5.0);
    }

    #[test]
    fn owner_write_accepts_owner_in_any_role() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::OwnerWrite, Snapshot::default()).unwrap();

        store.set(ENTITY, snapshot(1.0, 1.0), owner()).unwrap();
        store
            .set(ENTITY, snapshot(2.0, 2.0), CallerRole::new(PeerId(1), true, true))
            .unwrap();
        assert!(store.set(ENTITY, snapshot(3.0, 3.0), host()).is_err());
        assert_eq!(store.get(ENTITY).unwrap().position.x, 2.0);
    }

    #[test]
    fn despawn_releases_entry() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::HostWrite, Snapshot::default()).unwrap();
        store.set(ENTITY, snapshot(9.0, 1.0), host()).unwrap();

        assert_eq!(store.despawn(ENTITY).unwrap().position.x, 9.0);
        assert_eq!(store.get(ENTITY), Err(StoreError::UnknownEntity(ENTITY)));
        assert_eq!(
            store.set(ENTITY, snapshot(1.0, 2.0), host()),
            Err(StoreError::UnknownEntity(ENTITY))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn double_spawn_is_refused() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::HostWrite, Snapshot::default()).unwrap();
        assert_eq!(
            store.spawn(ENTITY, AuthorityMode::OwnerWrite, Snapshot::default()),
            Err(StoreError::AlreadySpawned(ENTITY))
        );
        assert_eq!(store.mode(ENTITY), Some(AuthorityMode::HostWrite));
    }

    #[test]
    fn unchecked_policy_lets_older_writes_through() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::HostWrite, Snapshot::default()).unwrap();

        store.set(ENTITY, snapshot(2.0, 2.0), host()).unwrap();
        store.set(ENTITY, snapshot(1.0, 1.0), host()).unwrap();
        assert_eq!(store.get(ENTITY).unwrap().timestamp, 1.0);
    }

    #[test]
    fn reject_stale_policy() {
        let mut store = AuthoritativeStore::with_policy(TimestampPolicy::RejectStale);
        store.spawn(ENTITY, AuthorityMode::HostWrite, snapshot(0.0, 50.0)).unwrap();

        // the spawn value never blocks the first write
        store.set(ENTITY, snapshot(2.0, 2.0), host()).unwrap();
        let err = store.set(ENTITY, snapshot(1.0, 1.0), host()).unwrap_err();
        assert!(matches!(err, StoreError::StaleSnapshot { .. }));
        assert_eq!(store.get(ENTITY).unwrap().timestamp, 2.0);

        store.set(ENTITY, snapshot(3.0, 2.0), host()).unwrap();
        assert_eq!(store.get(ENTITY).unwrap().position.x, 3.0);
    }

    #[test]
    fn mirror_only_from_host() {
        let mut store = AuthoritativeStore::new();
        store.spawn(ENTITY, AuthorityMode::OwnerWrite, Snapshot::default()).unwrap();

        assert!(store.mirror(ENTITY, snapshot(4.0, 1.0), owner()).is_err());
        store.mirror(ENTITY, snapshot(4.0, 1.0), host()).unwrap();
        assert_eq!(store.get(ENTITY).unwrap().position.x, 4.0);
        assert!(store.drain_dirty().is_empty());
    }

    #[test]
    fn drain_dirty_reports_each_write_once() {
        let mut store = AuthoritativeStore::new();
        store.spawn(EntityId(2), AuthorityMode::HostWrite, Snapshot::default()).unwrap();
        store.spawn(EntityId(1), AuthorityMode::HostWrite, Snapshot::default()).unwrap();

        store.set(EntityId(2), snapshot(2.0, 1.0), host()).unwrap();
        store.set(EntityId(1), snapshot(1.0, 1.0), host()).unwrap();

        let dirty = store.drain_dirty();
        assert_eq!(dirty.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![EntityId(1), EntityId(2)]);
        assert!(store.drain_dirty().is_empty());
    }
}

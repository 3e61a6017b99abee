use std::fmt;

use bitflags::bitflags;
use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SnapshotFlags: u8 {
        const GROUNDED = 1 << 0;
        const JUMPING = 1 << 1;
    }
}

/// Replicated motion state of one entity at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec3,
    pub grounded: bool,
    pub jumping: bool,
    pub timestamp: f64,
}

impl Snapshot {
    pub fn at_rest(position: Vec3, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            grounded: true,
            ..Self::default()
        }
    }

    pub fn flags(&self) -> SnapshotFlags {
        let mut flags = SnapshotFlags::empty();
        flags.set(SnapshotFlags::GROUNDED, self.grounded);
        flags.set(SnapshotFlags::JUMPING, self.jumping);
        flags
    }

    pub fn set_flags(&mut self, flags: SnapshotFlags) {
        self.grounded = flags.contains(SnapshotFlags::GROUNDED);
        self.jumping = flags.contains(SnapshotFlags::JUMPING);
    }
}

/// What a local simulator reports each tick for the entity it drives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalState {
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec3,
    pub grounded: bool,
    pub jumping: bool,
}

impl LocalState {
    pub fn snapshot_at(&self, timestamp: f64) -> Snapshot {
        Snapshot {
            position: self.position,
            rotation: self.rotation,
            velocity: self.velocity,
            grounded: self.grounded,
            jumping: self.jumping,
            timestamp,
        }
    }
}

impl From<&Snapshot> for LocalState {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            position: snapshot.position,
            rotation: snapshot.rotation,
            velocity: snapshot.velocity,
            grounded: snapshot.grounded,
            jumping: snapshot.jumping,
        }
    }
}

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Archive, Serialize, Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Which peer may write an entity's replicated state. Bound at spawn and
/// never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum AuthorityMode {
    #[default]
    HostWrite = 0,
    OwnerWrite = 1,
}

impl AuthorityMode {
    pub fn permits(self, caller: CallerRole) -> bool {
        match self {
            Self::HostWrite => caller.is_host,
            Self::OwnerWrite => caller.is_owner,
        }
    }

    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::HostWrite),
            1 => Some(Self::OwnerWrite),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostWrite => "host-write",
            Self::OwnerWrite => "owner-write",
        }
    }
}

impl fmt::Display for AuthorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A writer's standing relative to one entity, resolved at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerRole {
    pub peer: PeerId,
    pub is_host: bool,
    pub is_owner: bool,
}

impl CallerRole {
    pub fn new(peer: PeerId, is_host: bool, is_owner: bool) -> Self {
        Self {
            peer,
            is_host,
            is_owner,
        }
    }
}

pub mod authority;
pub mod config;
pub mod net;
pub mod peer;
pub mod publish;
pub mod simulation;
pub mod smoothing;
pub mod snapshot;
pub mod store;

pub use authority::{AuthorityMode, AuthorityResolver, CallerRole, PeerId, SessionTopology};
pub use config::{ConfigError, EntityClass, EntityConfig};
pub use net::{
    DEFAULT_PORT, LifecycleEvent, LinkConditions, NetworkStats, Packet, PacketError,
    ReplicationMessage, SimulatedNetwork, SimulatedTransport, Transport, TransportError,
    UdpTransport,
};
pub use peer::{Peer, PeerError, PeerEvent, Presentation, ReplicatedEntity};
pub use publish::{PublishOutcome, RateLimiter, StatePublisher};
pub use simulation::{
    Clock, FramePacer, LinearSimulator, LocalSimulator, ManualClock, StaticSimulator,
    SystemClock,
};
pub use smoothing::RemoteSmoother;
pub use snapshot::{EntityId, LocalState, SmoothingBuffer, Snapshot, SnapshotFlags};
pub use store::{AuthoritativeStore, StoreError, TimestampPolicy};

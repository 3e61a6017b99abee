mod endpoint;
mod protocol;
mod simulator;
mod stats;
mod tracking;
mod transport;

pub use endpoint::UdpTransport;
pub use protocol::{
    DEFAULT_PORT, EntityConfigPayload, LifecycleEvent, MAX_PACKET_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet,
    PacketError, PacketHeader, ReplicationMessage, SnapshotPayload, sequence_greater_than,
};
pub use simulator::{SimulatedNetwork, SimulatedTransport};
pub use stats::{LinkConditions, NetworkStats};
pub use tracking::{Arrival, ReceiveTracker, SenderTrackers};
pub use transport::{Transport, TransportError};

use std::io;

use crate::authority::PeerId;

use super::protocol::{PacketError, ReplicationMessage};
use super::stats::NetworkStats;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("channel to {peer} is unavailable")]
    ChannelUnavailable { peer: PeerId },
    #[error("no address known for {0}")]
    UnknownPeer(PeerId),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// Unreliable, unordered, fire-and-forget message channel between peers.
///
/// `send` returning `Ok` only means the message left this peer; it may still
/// be lost, delayed or reordered on the way.
pub trait Transport {
    fn local_peer(&self) -> PeerId;

    fn send(&mut self, to: PeerId, message: &ReplicationMessage) -> Result<(), TransportError>;

    fn receive(&mut self) -> Result<Vec<(PeerId, ReplicationMessage)>, TransportError>;

    fn stats(&self) -> NetworkStats;
}

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::authority::PeerId;

use super::protocol::{MAX_PACKET_SIZE, Packet, PacketHeader, ReplicationMessage};
use super::stats::NetworkStats;
use super::tracking::{Arrival, SenderTrackers};
use super::transport::{Transport, TransportError};

/// Non-blocking UDP transport with a static peer address book.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    local_peer: PeerId,
    peers: HashMap<PeerId, SocketAddr>,
    sequence: u32,
    stats: NetworkStats,
    trackers: SenderTrackers,
    recv_buffer: [u8; MAX_PACKET_SIZE],
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A, local_peer: PeerId) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            local_peer,
            peers: HashMap::new(),
            sequence: 0,
            stats: NetworkStats::default(),
            trackers: SenderTrackers::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn add_peer(&mut self, peer: PeerId, addr: SocketAddr) -> Option<SocketAddr> {
        self.peers.insert(peer, addr)
    }

    pub fn remove_peer(&mut self, peer: PeerId) -> Option<SocketAddr> {
        self.trackers.forget(peer);
        self.peers.remove(&peer)
    }

    pub fn peer_addr(&self, peer: PeerId) -> Option<SocketAddr> {
        self.peers.get(&peer).copied()
    }
}

impl Transport for UdpTransport {
    fn local_peer(&self) -> PeerId {
        self.local_peer
    }

    fn send(&mut self, to: PeerId, message: &ReplicationMessage) -> Result<(), TransportError> {
        let addr = self.peer_addr(to).ok_or(TransportError::UnknownPeer(to))?;

        let header = PacketHeader::new(self.sequence, self.local_peer);
        self.sequence = self.sequence.wrapping_add(1);
        let data = Packet::new(header, message.clone()).encode()?;

        match self.socket.send_to(&data, addr) {
            Ok(bytes) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += bytes as u64;
                Ok(())
            }
            Err(err) => {
                log::debug!("send to {} ({}) failed: {}", to, addr, err);
                Err(TransportError::ChannelUnavailable { peer: to })
            }
        }
    }

    fn receive(&mut self) -> Result<Vec<(PeerId, ReplicationMessage)>, TransportError> {
        let mut messages = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    let packet = match Packet::decode(&self.recv_buffer[..size]) {
                        Ok(packet) => packet,
                        Err(err) => {
                            self.stats.packets_invalid += 1;
                            log::debug!("discarding packet from {}: {}", addr, err);
                            continue;
                        }
                    };

                    let sender = packet.header.sender;
                    if self.peers.get(&sender) != Some(&addr) {
                        self.stats.packets_invalid += 1;
                        log::debug!("{} claims to be {} but is not registered there", addr, sender);
                        continue;
                    }

                    self.stats.packets_received += 1;
                    self.stats.bytes_received += size as u64;
                    if self.trackers.record(sender, packet.header.sequence) == Arrival::Reordered {
                        self.stats.packets_reordered += 1;
                    }
                    messages.push((sender, packet.payload));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // ICMP port unreachable from an earlier send surfaces here on some platforms
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(messages)
    }

    fn stats(&self) -> NetworkStats {
        self.stats.clone()
    }
}

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::authority::PeerId;
use crate::simulation::Clock;

use super::protocol::{Packet, PacketHeader, ReplicationMessage};
use super::stats::{LinkConditions, NetworkStats};
use super::tracking::{Arrival, SenderTrackers};
use super::transport::{Transport, TransportError};

#[derive(Debug)]
struct DelayedPacket {
    release_time: f64,
    order: u64,
    data: Vec<u8>,
}

impl PartialEq for DelayedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedPacket {}

impl PartialOrd for DelayedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

struct NetworkState {
    clock: Rc<dyn Clock>,
    rng: StdRng,
    default_link: LinkConditions,
    links: HashMap<(PeerId, PeerId), LinkConditions>,
    inboxes: HashMap<PeerId, BinaryHeap<DelayedPacket>>,
    stats: HashMap<PeerId, NetworkStats>,
    trackers: HashMap<PeerId, SenderTrackers>,
    next_order: u64,
}

impl NetworkState {
    fn link(&self, from: PeerId, to: PeerId) -> &LinkConditions {
        self.links.get(&(from, to)).unwrap_or(&self.default_link)
    }

    fn link_mut(&mut self, from: PeerId, to: PeerId) -> &mut LinkConditions {
        let default = self.default_link.clone();
        self.links.entry((from, to)).or_insert(default)
    }
}

/// In-process network with per-link loss, latency and jitter.
#[derive(Clone)]
pub struct SimulatedNetwork {
    inner: Rc<RefCell<NetworkState>>,
}

impl SimulatedNetwork {
    pub fn new(clock: Rc<dyn Clock>, seed: u64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NetworkState {
                clock,
                rng: StdRng::seed_from_u64(seed),
                default_link: LinkConditions::ideal(),
                links: HashMap::new(),
                inboxes: HashMap::new(),
                stats: HashMap::new(),
                trackers: HashMap::new(),
                next_order: 0,
            })),
        }
    }

    pub fn connect(&self, peer: PeerId) -> SimulatedTransport {
        let mut state = self.inner.borrow_mut();
        state.inboxes.entry(peer).or_default();
        state.stats.entry(peer).or_default();
        state.trackers.entry(peer).or_default();
        SimulatedTransport {
            peer,
            network: self.clone(),
            sequence: 0,
        }
    }

    pub fn disconnect(&self, peer: PeerId) {
        let mut state = self.inner.borrow_mut();
        state.inboxes.remove(&peer);
        state.trackers.remove(&peer);
        for trackers in state.trackers.values_mut() {
            trackers.forget(peer);
        }
    }

    pub fn set_default_link(&self, conditions: LinkConditions) {
        self.inner.borrow_mut().default_link = conditions;
    }

    pub fn set_link(&self, from: PeerId, to: PeerId, conditions: LinkConditions) {
        self.inner.borrow_mut().links.insert((from, to), conditions);
    }

    /// Takes both directions between `a` and `b` down or back up.
    pub fn set_link_down(&self, a: PeerId, b: PeerId, down: bool) {
        let mut state = self.inner.borrow_mut();
        state.link_mut(a, b).down = down;
        state.link_mut(b, a).down = down;
    }

    pub fn in_flight(&self) -> usize {
        self.inner.borrow().inboxes.values().map(BinaryHeap::len).sum()
    }

    pub fn stats(&self, peer: PeerId) -> NetworkStats {
        self.inner
            .borrow()
            .stats
            .get(&peer)
            .cloned()
            .unwrap_or_default()
    }

    fn deliver(
        &self,
        from: PeerId,
        to: PeerId,
        sequence: u32,
        message: &ReplicationMessage,
    ) -> Result<(), TransportError> {
        let mut guard = self.inner.borrow_mut();
        let state = &mut *guard;

        if !state.inboxes.contains_key(&to) || state.link(from, to).down {
            return Err(TransportError::ChannelUnavailable { peer: to });
        }

        let packet = Packet::new(PacketHeader::new(sequence, from), message.clone());
        let data = packet.encode()?;

        let link = state.link(from, to).clone();
        let stats = state.stats.entry(from).or_default();
        stats.packets_sent += 1;
        stats.bytes_sent += data.len() as u64;

        if link.should_drop(&mut state.rng) {
            stats.packets_lost += 1;
            log::trace!("dropped {} from {} to {}", message.kind(), from, to);
            return Ok(());
        }

        let delay = link.delay_ms(&mut state.rng) as f64 / 1000.0;
        let release_time = state.clock.now() + delay;
        let order = state.next_order;
        state.next_order += 1;

        if let Some(inbox) = state.inboxes.get_mut(&to) {
            inbox.push(DelayedPacket {
                release_time,
                order,
                data,
            });
        }
        Ok(())
    }

    fn collect(&self, peer: PeerId) -> Vec<(PeerId, ReplicationMessage)> {
        let mut guard = self.inner.borrow_mut();
        let NetworkState {
            clock,
            inboxes,
            stats,
            trackers,
            ..
        } = &mut *guard;

        let now = clock.now();
        let Some(inbox) = inboxes.get_mut(&peer) else {
            return Vec::new();
        };
        let stats = stats.entry(peer).or_default();
        let trackers = trackers.entry(peer).or_default();

        let mut messages = Vec::new();
        while inbox.peek().is_some_and(|p| p.release_time <= now) {
            let Some(delayed) = inbox.pop() else { break };
            match Packet::decode(&delayed.data) {
                Ok(packet) => {
                    stats.packets_received += 1;
                    stats.bytes_received += delayed.data.len() as u64;
                    if trackers.record(packet.header.sender, packet.header.sequence)
                        == Arrival::Reordered
                    {
                        stats.packets_reordered += 1;
                    }
                    messages.push((packet.header.sender, packet.payload));
                }
                Err(err) => {
                    stats.packets_invalid += 1;
                    log::debug!("discarding undecodable packet for {}: {}", peer, err);
                }
            }
        }
        messages
    }
}

pub struct SimulatedTransport {
    peer: PeerId,
    network: SimulatedNetwork,
    sequence: u32,
}

impl SimulatedTransport {
    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }
}

impl Transport for SimulatedTransport {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn send(&mut self, to: PeerId, message: &ReplicationMessage) -> Result<(), TransportError> {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        self.network.deliver(self.peer, to, sequence, message)
    }

    fn receive(&mut self) -> Result<Vec<(PeerId, ReplicationMessage)>, TransportError> {
        Ok(self.network.collect(self.peer))
    }

    fn stats(&self) -> NetworkStats {
        self.network.stats(self.peer)
    }
}

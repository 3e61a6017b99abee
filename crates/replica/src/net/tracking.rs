use std::collections::{HashMap, VecDeque};

use crate::authority::PeerId;

use super::protocol::sequence_greater_than;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    InOrder,
    Reordered,
    Duplicate,
}

/// Classifies arrivals from one sender by sequence number. Purely
/// diagnostic: reordered and duplicate packets are still delivered.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: Option<u32>,
    recent_sequences: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: None,
            recent_sequences: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    pub fn record_received(&mut self, sequence: u32) -> Arrival {
        if self.recent_sequences.contains(&sequence) {
            return Arrival::Duplicate;
        }

        if self.recent_sequences.len() >= self.max_recent {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        match self.last_received {
            Some(last) if !sequence_greater_than(sequence, last) => Arrival::Reordered,
            _ => {
                self.last_received = Some(sequence);
                Arrival::InOrder
            }
        }
    }

    pub fn last_received(&self) -> Option<u32> {
        self.last_received
    }
}

#[derive(Debug, Default)]
pub struct SenderTrackers {
    trackers: HashMap<PeerId, ReceiveTracker>,
}

impl SenderTrackers {
    pub fn record(&mut self, sender: PeerId, sequence: u32) -> Arrival {
        self.trackers.entry(sender).or_default().record_received(sequence)
    }

    pub fn forget(&mut self, sender: PeerId) {
        self.trackers.remove(&sender);
    }
}

use std::collections::{BTreeMap, VecDeque};

use crate::authority::PeerId;
use crate::net::{LifecycleEvent, ReplicationMessage, sequence_greater_than};

pub const LIFECYCLE_RESEND_SECS: f64 = 0.1;

#[derive(Debug, Clone)]
struct PendingEvent {
    sequence: u32,
    event: LifecycleEvent,
    last_sent: Option<f64>,
}

impl PendingEvent {
    fn is_due(&self, now: f64, resend_interval: f64) -> bool {
        self.last_sent
            .is_none_or(|sent| now - sent >= resend_interval)
    }
}

#[derive(Debug, Default)]
struct GuestQueue {
    pending: VecDeque<PendingEvent>,
    next_sequence: u32,
}

/// Host side: lifecycle events each guest has not acknowledged yet.
#[derive(Debug)]
pub struct LifecycleOutbox {
    guests: BTreeMap<PeerId, GuestQueue>,
    resend_interval: f64,
}

impl Default for LifecycleOutbox {
    fn default() -> Self {
        Self::new(LIFECYCLE_RESEND_SECS)
    }
}

impl LifecycleOutbox {
    pub fn new(resend_interval: f64) -> Self {
        Self {
            guests: BTreeMap::new(),
            resend_interval,
        }
    }

    pub fn push(&mut self, guest: PeerId, event: LifecycleEvent) -> u32 {
        let queue = self.guests.entry(guest).or_default();
        let sequence = queue.next_sequence;
        queue.next_sequence = queue.next_sequence.wrapping_add(1);
        queue.pending.push_back(PendingEvent {
            sequence,
            event,
            last_sent: None,
        });
        sequence
    }

    /// Drops everything up to and including `sequence`. Acks for sequences
    /// never issued are ignored.
    pub fn ack_up_to(&mut self, guest: PeerId, sequence: u32) {
        let Some(queue) = self.guests.get_mut(&guest) else {
            return;
        };
        if !sequence_greater_than(queue.next_sequence, sequence) {
            log::debug!("{} acked unissued lifecycle sequence {}", guest, sequence);
            return;
        }
        queue
            .pending
            .retain(|pending| sequence_greater_than(pending.sequence, sequence));
    }

    pub fn due(&mut self, now: f64) -> Vec<(PeerId, ReplicationMessage)> {
        let resend_interval = self.resend_interval;
        let mut due = Vec::new();
        for (&guest, queue) in self.guests.iter_mut() {
            for pending in queue
                .pending
                .iter_mut()
                .filter(|pending| pending.is_due(now, resend_interval))
            {
                pending.last_sent = Some(now);
                due.push((
                    guest,
                    ReplicationMessage::Lifecycle {
                        sequence: pending.sequence,
                        event: pending.event.clone(),
                    },
                ));
            }
        }
        due
    }

    pub fn forget(&mut self, guest: PeerId) {
        self.guests.remove(&guest);
    }

    pub fn pending_for(&self, guest: PeerId) -> usize {
        self.guests
            .get(&guest)
            .map_or(0, |queue| queue.pending.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Apply,
    Duplicate,
    /// An earlier message is still missing; the host will send it again.
    Early,
}

#[derive(Debug, Default)]
pub struct LifecycleInbox {
    next_expected: u32,
    applied_any: bool,
}

impl LifecycleInbox {
    pub fn accept(&mut self, sequence: u32) -> Delivery {
        if sequence == self.next_expected {
            self.next_expected = self.next_expected.wrapping_add(1);
            self.applied_any = true;
            Delivery::Apply
        } else if sequence_greater_than(sequence, self.next_expected) {
            Delivery::Early
        } else {
            Delivery::Duplicate
        }
    }

    pub fn acknowledged(&self) -> Option<u32> {
        self.applied_any
            .then(|| self.next_expected.wrapping_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::EntityId;

    const GUEST: PeerId = PeerId(2);

    fn despawn(id: u32) -> LifecycleEvent {
        LifecycleEvent::Despawn {
            entity_id: EntityId(id),
        }
    }

    fn sequences(due: &[(PeerId, ReplicationMessage)]) -> Vec<u32> {
        due.iter()
            .filter_map(|(_, message)| match message {
                ReplicationMessage::Lifecycle { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn resends_until_acked() {
        let mut outbox = LifecycleOutbox::new(0.1);
        outbox.push(GUEST, despawn(1));
        outbox.push(GUEST, despawn(2));

        assert_eq!(sequences(&outbox.due(0.0)), vec![0, 1]);
        assert!(outbox.due(0.05).is_empty());
        assert_eq!(sequences(&outbox.due(0.1)), vec![0, 1]);

        outbox.ack_up_to(GUEST, 0);
        assert_eq!(outbox.pending_for(GUEST), 1);
        assert_eq!(sequences(&outbox.due(0.2)), vec![1]);

        outbox.ack_up_to(GUEST, 1);
        assert_eq!(outbox.pending_for(GUEST), 0);
        assert!(outbox.due(1.0).is_empty());
    }

    #[test]
    fn ignores_ack_beyond_issued() {
        let mut outbox = LifecycleOutbox::default();
        outbox.push(GUEST, despawn(1));
        outbox.ack_up_to(GUEST, 5);
        assert_eq!(outbox.pending_for(GUEST), 1);
    }

    #[test]
    fn sequences_are_per_guest() {
        let mut outbox = LifecycleOutbox::default();
        assert_eq!(outbox.push(GUEST, despawn(1)), 0);
        assert_eq!(outbox.push(GUEST, despawn(2)), 1);
        assert_eq!(outbox.push(PeerId(3), despawn(1)), 0);

        outbox.forget(GUEST);
        assert_eq!(outbox.pending_for(GUEST), 0);
        assert_eq!(outbox.pending_for(PeerId(3)), 1);
    }

    #[test]
    fn inbox_applies_in_order() {
        let mut inbox = LifecycleInbox::default();
        assert_eq!(inbox.acknowledged(), None);

        assert_eq!(inbox.accept(1), Delivery::Early);
        assert_eq!(inbox.acknowledged(), None);
        assert_eq!(inbox.accept(0), Delivery::Apply);
        assert_eq!(inbox.accept(0), Delivery::Duplicate);
        assert_eq!(inbox.accept(1), Delivery::Apply);
        assert_eq!(inbox.acknowledged(), Some(1));
    }
}

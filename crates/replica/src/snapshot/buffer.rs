use std::collections::VecDeque;

use glam::Vec3;

use super::state::Snapshot;

pub const DEFAULT_SMOOTHING_BUFFER_SIZE: usize = 4;
pub const MAX_SMOOTHING_BUFFER_SIZE: usize = 256;

/// Bounded FIFO of the most recent snapshots sampled for one remote entity.
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for SmoothingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_BUFFER_SIZE)
    }
}

impl SmoothingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity.min(MAX_SMOOTHING_BUFFER_SIZE) + 1),
            capacity,
        }
    }

    /// Appends `snapshot`, returning the evicted oldest entry on overflow.
    pub fn push(&mut self, snapshot: Snapshot) -> Option<Snapshot> {
        self.snapshots.push_back(snapshot);
        if self.snapshots.len() > self.capacity {
            self.snapshots.pop_front()
        } else {
            None
        }
    }

    pub fn mean_position(&self) -> Option<Vec3> {
        if self.snapshots.is_empty() {
            return None;
        }
        let sum: Vec3 = self.snapshots.iter().map(|s| s.position).sum();
        Some(sum / self.snapshots.len() as f32)
    }

    pub fn mean_rotation(&self) -> Option<f32> {
        if self.snapshots.is_empty() {
            return None;
        }
        let sum: f32 = self.snapshots.iter().map(|s| s.rotation).sum();
        Some(sum / self.snapshots.len() as f32)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.snapshots.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_x(x: f32) -> Snapshot {
        Snapshot {
            position: Vec3::new(x, 0.0, 0.0),
            rotation: x,
            ..Snapshot::default()
        }
    }

    #[test]
    fn evicts_first_inserted() {
        let mut buffer = SmoothingBuffer::new(4);

        for x in [1.0, 2.0, 3.0, 4.0] {
            assert!(buffer.push(at_x(x)).is_none());
        }
        let evicted = buffer.push(at_x(5.0)).expect("overflow evicts");

        assert_eq!(evicted.position.x, 1.0);
        assert_eq!(buffer.len(), 4);
        let xs: Vec<f32> = buffer.iter().map(|s| s.position.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buffer = SmoothingBuffer::new(3);
        for i in 0..100 {
            buffer.push(at_x(i as f32));
            assert!(buffer.len() <= 3);
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.oldest().unwrap().position.x, 97.0);
        assert_eq!(buffer.latest().unwrap().position.x, 99.0);
    }

    #[test]
    fn mean_is_exact() {
        let mut buffer = SmoothingBuffer::new(4);
        for x in [0.0, 10.0, 20.0, 30.0] {
            buffer.push(at_x(x));
        }

        assert_eq!(buffer.mean_position(), Some(Vec3::new(15.0, 0.0, 0.0)));
        assert_eq!(buffer.mean_rotation(), Some(15.0));
    }

    #[test]
    fn partial_and_empty_buffers() {
        let mut buffer = SmoothingBuffer::new(4);
        assert_eq!(buffer.mean_position(), None);
        assert_eq!(buffer.mean_rotation(), None);

        buffer.push(at_x(8.0));
        assert_eq!(buffer.mean_position(), Some(Vec3::new(8.0, 0.0, 0.0)));

        buffer.push(at_x(8.0));
        buffer.push(at_x(2.0));
        assert_eq!(buffer.mean_position(), Some(Vec3::new(6.0, 0.0, 0.0)));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buffer = SmoothingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(at_x(1.0));
        buffer.push(at_x(2.0));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.latest().unwrap().position.x, 2.0);
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let mut buffer = SmoothingBuffer::new(usize::MAX);
        assert_eq!(buffer.capacity(), usize::MAX);
        assert!(buffer.push(at_x(1.0)).is_none());
        assert_eq!(buffer.len(), 1);
    }
}

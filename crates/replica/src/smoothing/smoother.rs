use glam::Vec3;

use crate::snapshot::{SmoothingBuffer, Snapshot};

/// Share of the remaining gap to close this frame.
pub fn approach_factor(interpolation_rate: f32, delta_time: f32) -> f32 {
    (interpolation_rate * delta_time).clamp(0.0, 1.0)
}

fn step_toward(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

/// Presents a remote entity by averaging the last few sampled snapshots and
/// easing the displayed pose toward that average.
#[derive(Debug, Clone)]
pub struct RemoteSmoother {
    buffer: SmoothingBuffer,
    displayed_position: Vec3,
    displayed_rotation: f32,
    interpolation_rate: f32,
}

impl RemoteSmoother {
    pub fn new(buffer_size: usize, interpolation_rate: f32, initial: &Snapshot) -> Self {
        Self {
            buffer: SmoothingBuffer::new(buffer_size),
            displayed_position: initial.position,
            displayed_rotation: initial.rotation,
            interpolation_rate,
        }
    }

    pub fn update(&mut self, latest: &Snapshot, delta_time: f32) -> (Vec3, f32) {
        self.buffer.push(*latest);

        let target_position = self
            .buffer
            .mean_position()
            .unwrap_or(self.displayed_position);
        let target_rotation = self
            .buffer
            .mean_rotation()
            .unwrap_or(self.displayed_rotation);

        let factor = approach_factor(self.interpolation_rate, delta_time);
        self.displayed_position = self.displayed_position.lerp(target_position, factor);
        self.displayed_rotation = step_toward(self.displayed_rotation, target_rotation, factor);

        (self.displayed_position, self.displayed_rotation)
    }

    pub fn displayed_position(&self) -> Vec3 {
        self.displayed_position
    }

    pub fn displayed_rotation(&self) -> f32 {
        self.displayed_rotation
    }

    pub fn interpolation_rate(&self) -> f32 {
        self.interpolation_rate
    }

    pub fn buffer(&self) -> &SmoothingBuffer {
        &self.buffer
    }
}

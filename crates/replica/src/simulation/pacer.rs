pub const DEFAULT_MAX_CATCH_UP_SECS: f32 = 0.25;

/// Turns irregular wall-clock deltas into whole fixed-length frames for
/// loops that run against the real clock.
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame_rate: u32,
    frame_time: f32,
    accumulator: f32,
    max_catch_up: f32,
    frames_dropped: u64,
}

impl FramePacer {
    pub fn new(frame_rate: u32) -> Self {
        let frame_rate = frame_rate.max(1);
        Self {
            frame_rate,
            frame_time: 1.0 / frame_rate as f32,
            accumulator: 0.0,
            max_catch_up: DEFAULT_MAX_CATCH_UP_SECS,
            frames_dropped: 0,
        }
    }

    pub fn with_max_catch_up(mut self, seconds: f32) -> Self {
        self.max_catch_up = seconds.max(self.frame_time);
        self
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn accumulate(&mut self, delta: f32) {
        let delta = delta.max(0.0);
        if delta > self.max_catch_up {
            let lost = ((delta - self.max_catch_up) / self.frame_time) as u64;
            if lost > 0 {
                log::debug!("stalled {:.3}s, dropping {} frames", delta, lost);
            }
            self.frames_dropped += lost;
        }
        self.accumulator += delta.min(self.max_catch_up);
    }

    pub fn next_frame(&mut self) -> Option<f32> {
        if self.accumulator >= self.frame_time {
            self.accumulator -= self.frame_time;
            Some(self.frame_time)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_frames_only() {
        let mut pacer = FramePacer::new(60);

        pacer.accumulate(1.0 / 30.0 + 0.001);
        assert!(pacer.next_frame().is_some());
        assert!(pacer.next_frame().is_some());
        assert_eq!(pacer.next_frame(), None);

        pacer.accumulate(0.016);
        assert!(pacer.next_frame().is_some());
    }

    #[test]
    fn stall_is_capped_and_counted() {
        let mut pacer = FramePacer::new(100).with_max_catch_up(0.1);
        pacer.accumulate(1.1);

        let mut frames = 0;
        while pacer.next_frame().is_some() {
            frames += 1;
        }
        assert!(frames <= 10);
        assert!(pacer.frames_dropped() >= 99);
    }

    #[test]
    fn zero_rate_is_clamped() {
        let pacer = FramePacer::new(0);
        assert_eq!(pacer.frame_rate(), 1);
        assert_eq!(pacer.frame_time(), 1.0);
    }
}

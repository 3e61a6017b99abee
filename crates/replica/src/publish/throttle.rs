/// Slack for clock values that drift by a few ulps across summed frame times.
pub const TIMING_TOLERANCE: f64 = 1e-6;

/// Lets one action through per interval, measured on the caller's clock.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: f64,
    last_publish: Option<f64>,
}

impl RateLimiter {
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval: interval_seconds.max(0.0),
            last_publish: None,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn last_publish(&self) -> Option<f64> {
        self.last_publish
    }

    pub fn ready(&self, now: f64) -> bool {
        match self.last_publish {
            None => true,
            Some(last) => now - last >= self.interval - TIMING_TOLERANCE,
        }
    }

    pub fn mark(&mut self, now: f64) {
        self.last_publish = Some(now);
    }

    pub fn try_acquire(&mut self, now: f64) -> bool {
        if self.ready(now) {
            self.mark(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_publish = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_passes() {
        let mut limiter = RateLimiter::new(10.0);
        assert!(limiter.try_acquire(123.0));
        assert!(!limiter.try_acquire(124.0));
    }

    #[test]
    fn once_per_twelve_ticks_at_120hz() {
        let mut limiter = RateLimiter::new(0.1);
        let dt = 1.0 / 120.0;
        let mut now = 0.0;
        let mut published = Vec::new();

        for tick in 0..120 {
            if limiter.try_acquire(now) {
                published.push(tick);
            }
            now += dt;
        }

        assert_eq!(published.len(), 10);
        for (i, tick) in published.iter().enumerate() {
            assert_eq!(*tick, i * 12);
        }
    }

    #[test]
    fn reset_reopens() {
        let mut limiter = RateLimiter::new(1.0);
        limiter.mark(5.0);
        assert!(!limiter.ready(5.5));
        limiter.reset();
        assert!(limiter.ready(5.5));
    }
}

use rand::Rng;

/// Delivery conditions for one direction of a simulated link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkConditions {
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
    pub down: bool,
}

impl LinkConditions {
    pub fn ideal() -> Self {
        Self::default()
    }

    pub fn lossy(loss_percent: f32, min_latency_ms: u32, max_latency_ms: u32, jitter_ms: u32) -> Self {
        Self {
            loss_percent,
            min_latency_ms,
            max_latency_ms,
            jitter_ms,
            down: false,
        }
    }

    pub fn should_drop<R: Rng>(&self, rng: &mut R) -> bool {
        if self.loss_percent <= 0.0 {
            return false;
        }
        rng.gen_range(0.0f32..100.0) < self.loss_percent
    }

    pub fn delay_ms<R: Rng>(&self, rng: &mut R) -> u32 {
        let base = self.min_latency_ms;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let spread = if range > 0 { rng.gen_range(0..=range) } else { 0 };
        let jitter = if self.jitter_ms > 0 {
            rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        base + spread + jitter
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub packets_invalid: u64,
    pub packets_reordered: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl NetworkStats {
    pub fn packet_loss_percent(&self) -> f32 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_lost as f32 / self.packets_sent as f32 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn ideal_link_never_drops_or_delays() {
        let mut rng = StdRng::seed_from_u64(1);
        let link = LinkConditions::ideal();
        for _ in 0..100 {
            assert!(!link.should_drop(&mut rng));
            assert_eq!(link.delay_ms(&mut rng), 0);
        }
    }

    #[test]
    fn delay_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let link = LinkConditions::lossy(0.0, 20, 60, 10);
        for _ in 0..1000 {
            let delay = link.delay_ms(&mut rng);
            assert!((20..=70).contains(&delay));
        }
    }

    #[test]
    fn total_loss_drops_everything() {
        let mut rng = StdRng::seed_from_u64(3);
        let link = LinkConditions::lossy(100.0, 0, 0, 0);
        assert!((0..100).all(|_| link.should_drop(&mut rng)));
    }

    #[test]
    fn loss_percent_from_counters() {
        let stats = NetworkStats {
            packets_sent: 200,
            packets_lost: 50,
            ..NetworkStats::default()
        };
        assert_eq!(stats.packet_loss_percent(), 25.0);
        assert_eq!(NetworkStats::default().packet_loss_percent(), 0.0);
    }
}

use replica::{LinkConditions, TimestampPolicy};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub frame_rate: u32,
    pub duration_secs: f32,
    pub guests: u32,
    pub link: LinkConditions,
    pub seed: u64,
    pub timestamp_policy: TimestampPolicy,
    pub report_interval_secs: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            duration_secs: 10.0,
            guests: 2,
            link: LinkConditions::ideal(),
            seed: 1,
            timestamp_policy: TimestampPolicy::Unchecked,
            report_interval_secs: 1.0,
        }
    }
}

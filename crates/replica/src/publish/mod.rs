mod publisher;
mod throttle;

pub use publisher::{PublishOutcome, StatePublisher};
pub use throttle::{RateLimiter, TIMING_TOLERANCE};

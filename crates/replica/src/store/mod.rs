mod authoritative;
mod error;

pub use authoritative::{AuthoritativeStore, TimestampPolicy};
pub use error::StoreError;

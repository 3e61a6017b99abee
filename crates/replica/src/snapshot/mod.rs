mod buffer;
mod state;

pub use buffer::{DEFAULT_SMOOTHING_BUFFER_SIZE, MAX_SMOOTHING_BUFFER_SIZE, SmoothingBuffer};
pub use state::{EntityId, LocalState, Snapshot, SnapshotFlags};

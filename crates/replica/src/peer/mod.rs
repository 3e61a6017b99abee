mod entity;
mod error;
mod events;
mod lifecycle;
mod session;

pub use entity::{Presentation, ReplicatedEntity};
pub use error::PeerError;
pub use events::PeerEvent;
pub use lifecycle::{Delivery, LIFECYCLE_RESEND_SECS, LifecycleInbox, LifecycleOutbox};
pub use session::Peer;

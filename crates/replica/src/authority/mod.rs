mod mode;
mod resolver;

pub use mode::{AuthorityMode, CallerRole, PeerId};
pub use resolver::{AuthorityResolver, SessionTopology};

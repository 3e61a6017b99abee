mod smoother;

pub use smoother::{RemoteSmoother, approach_factor};

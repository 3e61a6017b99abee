mod clock;
mod local;
mod pacer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use local::{LinearSimulator, LocalSimulator, StaticSimulator};
pub use pacer::{DEFAULT_MAX_CATCH_UP_SECS, FramePacer};

pub mod clock;
pub mod ip;

pub use clock::{Clock, ManualClock, SystemClock};

//! Stream combinators for update delivery

pub mod throttle;

pub use throttle::{Throttle, ThrottleExt};

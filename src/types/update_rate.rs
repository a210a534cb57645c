//! Update rate control for progress streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate for watch-backed update streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every change as it is published
    Native,

    /// At most this many updates per second; intermediate values are coalesced
    Max(u32),
}

impl UpdateRate {
    /// Minimum spacing between updates, or `None` when unthrottled.
    ///
    /// `Max(0)` is treated as `Native`.
    pub fn interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

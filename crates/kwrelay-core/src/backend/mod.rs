//! Chat platform abstraction: the port the relay drives, plus decorators.

use std::{sync::Arc, time::Duration};

pub mod port;
pub mod throttled;
pub mod timed;

use port::ChatBackend;
use throttled::{ThrottleConfig, ThrottledBackend};
use timed::TimedBackend;

/// Wrap a raw adapter the way the relay expects to drive it: throttled on the
/// outside, every network call bounded by `timeout` on the inside (the wait
/// for a throttle slot does not count against the timeout).
pub fn layered(raw: Arc<dyn ChatBackend>, timeout: Duration) -> Arc<dyn ChatBackend> {
    let timed: Arc<dyn ChatBackend> = Arc::new(TimedBackend::new(raw, timeout));
    Arc::new(ThrottledBackend::new(timed, ThrottleConfig::default()))
}

use std::time::Duration;

/// Connection attempts per establishment cycle before surfacing the error.
pub(crate) const MAX_CONNECT_ATTEMPTS: u32 = 3;
/// Fixed delay between connection attempts and before resuming after a
/// mid-session failure.
pub(crate) const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Outbound audio queue depth; the single deliberate backpressure point.
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 5;
/// Text-pipeline sentinel that ends the current turn group.
pub(crate) const QUIT_COMMAND: &str = "q";
/// Consecutive device-open failures tolerated before terminating.
pub(crate) const MAX_DEVICE_OPEN_FAILURES: u32 = 3;

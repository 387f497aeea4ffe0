use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Default timeout for awaiting signals in tests.
///
/// Nothing awaited in the tests should take more than a few seconds.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Awaits futures with a timeout so that a missing signal fails the test instead of hanging it.
#[derive(Clone, Copy)]
pub struct TimedWait {
    timeout_duration: Duration,
}

impl TimedWait {
    /// Creates a new [`TimedWait`] with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_WAIT_TIMEOUT)
    }

    /// Creates a new [`TimedWait`] with a custom timeout duration.
    pub fn with_timeout(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }

    /// Awaits `future`.
    ///
    /// # Panics
    ///
    /// Panics if the timeout elapses before `future` completes.
    pub async fn wait<F: Future>(&self, future: F) -> F::Output {
        match timeout(self.timeout_duration, future).await {
            Ok(output) => output,
            Err(_) => panic!(
                "Test wait timed out after {:?}. \
                 The awaited signal was most likely never fired.",
                self.timeout_duration
            ),
        }
    }
}

impl Default for TimedWait {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimedWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedWait")
            .field("timeout_duration", &self.timeout_duration)
            .finish()
    }
}

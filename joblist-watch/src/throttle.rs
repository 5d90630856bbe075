//! Delay between successive long-poll cycles.

use std::time::Duration;

/// The pause a loop takes before re-arming its blocking query.
///
/// The backend owns the blocking timeout; the client only spaces out its own
/// calls. A zero throttle still yields to the scheduler so a loop fed with
/// immediate replies cannot starve its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// A throttle that never sleeps.
    pub fn zero() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_zero(&self) -> bool {
        self.delay.is_zero()
    }

    /// Waits out the delay.
    pub async fn wait(&self) {
        if self.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::zero()
    }
}

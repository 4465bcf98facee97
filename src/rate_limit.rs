//! Minimum-interval gate for outbound calls to external collaborators.
//!
//! State starts at zero (no call made yet). `wait_until_permitted` blocks the
//! caller until at least `min_interval` has passed since the previous
//! permitted call, then records the new call time.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Process-wide limiter shared by every geocoding client in the process.
pub static GEOCODER_LIMITER: RateLimiter = RateLimiter::new(Duration::from_secs(1));

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the next call is allowed. Returns how long we slept.
    pub fn wait_until_permitted(&self) -> Duration {
        // A poisoned lock only means another caller panicked mid-wait; the
        // stored instant is still meaningful.
        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let waited = match *last_call {
            Some(previous) => {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    let remaining = self.min_interval - elapsed;
                    thread::sleep(remaining);
                    remaining
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        *last_call = Some(Instant::now());
        waited
    }

    /// Forget the previous call.
    pub fn reset(&self) {
        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last_call = None;
    }
}

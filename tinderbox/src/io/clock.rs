//! Time source for run timestamps and the inter-run sleep.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Injectable clock so the scheduler can be driven without real delays.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

/// Wall clock with a blocking sleep.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

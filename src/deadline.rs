use crate::error::{QueueError, Result};
use nix::sys::time::TimeSpec;
use nix::time::{clock_gettime, ClockId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Absolute point in time bounding a timed send or receive
///
/// Measured on `CLOCK_REALTIME`, the clock `mq_timedsend`/`mq_timedreceive`
/// compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Deadline {
    seconds: i64,
    nanoseconds: u32,
}

impl Deadline {
    pub fn new(seconds: i64, nanoseconds: u32) -> Result<Self> {
        if nanoseconds >= NANOS_PER_SEC {
            return Err(QueueError::invalid(format!(
                "deadline nanoseconds must be below {}, got {}",
                NANOS_PER_SEC, nanoseconds
            )));
        }
        Ok(Self {
            seconds,
            nanoseconds,
        })
    }

    /// The current time
    pub fn now() -> Self {
        let ts = clock_gettime(ClockId::CLOCK_REALTIME).unwrap_or_else(|e| {
            warn!("clock_gettime(CLOCK_REALTIME) failed, deadlines will expire at once: {}", e);
            TimeSpec::new(0, 0)
        });
        Self {
            seconds: ts.tv_sec() as i64,
            nanoseconds: ts.tv_nsec() as u32,
        }
    }

    /// A deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self::now().saturating_add(timeout)
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanoseconds(&self) -> u32 {
        self.nanoseconds
    }

    pub fn has_passed(&self) -> bool {
        *self <= Self::now()
    }

    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        let now = Self::now();
        if *self <= now {
            return Duration::ZERO;
        }
        let mut secs = self.seconds - now.seconds;
        let nanos = if self.nanoseconds >= now.nanoseconds {
            self.nanoseconds - now.nanoseconds
        } else {
            secs -= 1;
            self.nanoseconds + NANOS_PER_SEC - now.nanoseconds
        };
        Duration::new(secs as u64, nanos)
    }

    fn saturating_add(self, duration: Duration) -> Self {
        let mut nanos = self.nanoseconds + duration.subsec_nanos();
        let mut secs = self
            .seconds
            .saturating_add(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX));
        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs = secs.saturating_add(1);
        }
        Self {
            seconds: secs,
            nanoseconds: nanos,
        }
    }

    pub fn to_timespec(self) -> TimeSpec {
        TimeSpec::new(self.seconds as _, self.nanoseconds as _)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

//! Time sources. The session needs a monotonic clock for the decay cadence and
//! cooldowns, and a wall clock for save timestamps.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    fn instant(&self) -> Instant;
    fn wall(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn instant(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock. Clones share the same offsets, so a test can keep one
/// handle while the session owns another.
#[derive(Clone, Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_wall: DateTime<Utc>,
    elapsed: Rc<Cell<Duration>>,
    wall_skew_ms: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(base_wall: DateTime<Utc>) -> Self {
        Self {
            base_instant: Instant::now(),
            base_wall,
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            wall_skew_ms: Rc::new(Cell::new(0)),
        }
    }

    /// Moves both clocks forward.
    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    /// Shifts only the wall clock, e.g. to simulate the user changing the
    /// system time. Negative values step it backwards.
    pub fn skew_wall(&self, ms: i64) {
        self.wall_skew_ms.set(self.wall_skew_ms.get() + ms);
    }
}

impl Clock for ManualClock {
    fn instant(&self) -> Instant {
        self.base_instant + self.elapsed.get()
    }

    fn wall(&self) -> DateTime<Utc> {
        let elapsed_ms = self.elapsed.get().as_millis() as i64;
        self.base_wall + ChronoDuration::milliseconds(elapsed_ms + self.wall_skew_ms.get())
    }
}

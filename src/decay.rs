//! Live decay cadence and offline catch-up.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug)]
struct Running {
    interval_ms: u64,
    next_due: Instant,
}

/// Repeating decay schedule driven by polling.
///
/// Ticks only come out of [`DecaySchedule::due_ticks`]; once stopped, no
/// further tick is ever reported until the schedule is started again.
#[derive(Clone, Debug, Default)]
pub struct DecaySchedule {
    running: Option<Running>,
}

impl DecaySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the cadence. The first tick is due one interval
    /// after `now`. A zero interval leaves the schedule idle.
    pub fn start(&mut self, interval_ms: u64, now: Instant) {
        self.stop();
        if interval_ms == 0 {
            log::warn!("refusing to start decay with a zero interval");
            return;
        }
        self.running = Some(Running {
            interval_ms,
            next_due: now + Duration::from_millis(interval_ms),
        });
    }

    /// Returns whether a schedule was actually cancelled.
    pub fn stop(&mut self) -> bool {
        self.running.take().is_some()
    }

    pub fn state(&self) -> ScheduleState {
        if self.running.is_some() {
            ScheduleState::Running
        } else {
            ScheduleState::Idle
        }
    }

    pub fn interval_ms(&self) -> Option<u64> {
        self.running.map(|r| r.interval_ms)
    }

    /// Number of whole intervals that came due up to `now`, consuming them.
    pub fn due_ticks(&mut self, now: Instant) -> u64 {
        let Some(r) = self.running.as_mut() else {
            return 0;
        };
        if now < r.next_due {
            return 0;
        }
        let late_ms = now.duration_since(r.next_due).as_millis();
        let ticks = (late_ms / r.interval_ms as u128 + 1) as u64;
        r.next_due += Duration::from_millis(ticks.saturating_mul(r.interval_ms));
        ticks
    }
}

/// Whole decay intervals between `last_saved` and `now`. Clock skew
/// (`now < last_saved`) and a zero interval both count as none.
pub fn elapsed_intervals(last_saved: DateTime<Utc>, now: DateTime<Utc>, interval_ms: u64) -> u64 {
    if interval_ms == 0 {
        return 0;
    }
    let elapsed_ms = (now - last_saved).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }
    elapsed_ms as u64 / interval_ms
}

/// Value a stat would have reached had the app stayed open from
/// `last_saved` until `now`, never below `min` and never above `current_value`.
pub fn calculate_offline_decay(
    last_saved: DateTime<Utc>,
    current_value: f64,
    decay_rate: f64,
    interval_ms: u64,
    now: DateTime<Utc>,
    min: f64,
) -> f64 {
    let intervals = elapsed_intervals(last_saved, now, interval_ms);
    let decay = intervals as f64 * decay_rate.max(0.0);
    (current_value - decay).max(min)
}

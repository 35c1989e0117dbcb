use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Source of "now" for everything that stamps or compares timestamps.
///
/// Timestamps are persisted as whole epoch seconds, so implementations should
/// hand out whole seconds; otherwise a value returned from a write would not
/// compare equal to the same value read back.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to whole seconds. Never goes backwards: if the
/// system time steps back, the last value handed out is repeated until the
/// wall clock catches up.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<DateTime<Utc>>,
}

impl SystemClock {
    fn observe(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if wall > *last {
            *last = wall;
        }
        *last
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now().trunc_subsecs(0))
    }
}

/// Deterministic clock for tests and tooling.
///
/// Every call to [`Clock::now`] returns the current value and then advances it
/// by `tick`. A zero tick gives a frozen clock.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<DateTime<Utc>>,
    tick: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_tick(start, Duration::zero())
    }

    pub fn with_tick(start: DateTime<Utc>, tick: Duration) -> Self {
        Self {
            state: Mutex::new(start),
            tick,
        }
    }

    /// Current value without advancing.
    pub fn peek(&self) -> DateTime<Utc> {
        *self.lock()
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A panic while holding this lock cannot leave the timestamp torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut state = self.lock();
        let now = *state;
        *state = now + self.tick;
        now
    }
}

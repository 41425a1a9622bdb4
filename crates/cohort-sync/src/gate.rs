//! The clock gate: a cohort is active until its end timestamp has passed.
//!
//! Gate state is always derived from `now` and the stored end time, never
//! stored itself. `active -> expired` is the only transition.

use chrono::{DateTime, Duration, Utc};
use cohort_storage::Cohort;
use std::sync::{Mutex, PoisonError};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Active,
    Expired,
}

impl GateState {
    pub fn at(cohort: &Cohort, now: DateTime<Utc>) -> Self {
        if is_expired(cohort, now) {
            GateState::Expired
        } else {
            GateState::Active
        }
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Active => f.write_str("active"),
            GateState::Expired => f.write_str("ended"),
        }
    }
}

/// `true` once `now` is strictly after the cohort's end timestamp.
pub fn is_expired(cohort: &Cohort, now: DateTime<Utc>) -> bool {
    now > cohort.ends_at
}

/// Time left before the cohort ends. Display only; writes consult [`is_expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Left(Duration),
    Ended,
}

pub fn remaining(cohort: &Cohort, now: DateTime<Utc>) -> Remaining {
    remaining_until(cohort.ends_at, now)
}

pub fn remaining_until(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Remaining {
    if now > ends_at {
        Remaining::Ended
    } else {
        Remaining::Left(ends_at - now)
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let left = match self {
            Remaining::Ended => return f.write_str("Ended"),
            Remaining::Left(left) => *left,
        };
        let days = left.num_days();
        let hours = left.num_hours() % 24;
        let minutes = left.num_minutes() % 60;
        if days > 0 {
            write!(f, "{days}d {hours}h")
        } else if hours > 0 {
            write!(f, "{hours}h {minutes}m")
        } else {
            write!(f, "{minutes}m")
        }
    }
}

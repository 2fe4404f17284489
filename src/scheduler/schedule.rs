//! Daily fire-time arithmetic.
//!
//! Everything here is a pure function of the local wall-clock time so the
//! misfire and catch-up rules can be tested without a runtime.

use crate::config::DigestConfig;
use crate::error::{Result, ScholarError};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// Longest accepted misfire grace window.
pub const MAX_MISFIRE_GRACE_SECS: u64 = 24 * 3600;

/// One fire per calendar day at a fixed local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

/// What the scheduler loop should do at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// Nothing to do.
    Idle,
    /// Run the slot for `slot`, `late_by` after its scheduled time.
    Fire { slot: NaiveDate, late_by: Duration },
    /// The slot for `slot` was missed by more than the grace window; drop it.
    Missed { slot: NaiveDate, late_by: Duration },
}

impl DailySchedule {
    /// Schedule firing at `hour:minute` local time.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] for an out-of-range time.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0).ok_or_else(|| {
            ScholarError::Config(format!("invalid digest time {hour:02}:{minute:02}"))
        })?;
        Ok(Self { at })
    }

    /// Schedule from the `[digest]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ScholarError::Config`] for an out-of-range time.
    pub fn from_config(config: &DigestConfig) -> Result<Self> {
        Self::new(config.hour, config.minute)
    }

    /// Scheduled fire time on `date`.
    pub fn scheduled_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.at)
    }

    /// First scheduled time strictly after `now`.
    pub fn next_fire_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = self.scheduled_at(now.date());
        if today > now {
            return today;
        }
        match now.date().succ_opt() {
            Some(tomorrow) => self.scheduled_at(tomorrow),
            None => today,
        }
    }

    /// Decide whether the loop should fire now.
    ///
    /// `handled` is the most recent slot date already run or dropped. A
    /// slot from the previous day is only considered while it is still
    /// inside the grace window, so a fresh process never reports
    /// yesterday as missed.
    pub fn decide(
        &self,
        now: NaiveDateTime,
        handled: Option<NaiveDate>,
        grace: Duration,
    ) -> FireDecision {
        let today = now.date();
        let slot = if now >= self.scheduled_at(today) {
            today
        } else {
            match today.pred_opt() {
                Some(yesterday) => yesterday,
                None => return FireDecision::Idle,
            }
        };

        if handled.is_some_and(|done| done >= slot) {
            return FireDecision::Idle;
        }

        let late_by = now - self.scheduled_at(slot);
        if late_by <= grace {
            FireDecision::Fire { slot, late_by }
        } else if slot == today {
            FireDecision::Missed { slot, late_by }
        } else {
            FireDecision::Idle
        }
    }

    /// Startup catch-up rule: today's fire time has passed and no record
    /// carries today's date.
    pub fn needs_catch_up(&self, now: NaiveDateTime, latest_record: Option<NaiveDate>) -> bool {
        latest_record != Some(now.date()) && now >= self.scheduled_at(now.date())
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daily at {} local time", self.at.format("%H:%M"))
    }
}

/// Grace window from config seconds, capped at one day.
pub fn grace_window(secs: u64) -> Duration {
    let secs = secs.min(MAX_MISFIRE_GRACE_SECS);
    Duration::seconds(i64::try_from(secs).unwrap_or(0))
}

//! Reschedule window policy.
//!
//! One function decides how far an appointment may move given how many days
//! remain until it. Both the server-side check and any UI preview call
//! [`DateWindowPolicy::window`], so the thresholds live only here.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Below this many days of notice an appointment can no longer be moved.
pub const MIN_LEAD_DAYS: i64 = 3;

/// Which row of the lead-time table produced a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTier {
    /// 3 to 10 days out: only later than the current date.
    ForwardOnly,
    /// 11 to 15 days out: up to 7 days earlier.
    ShortPullIn,
    /// 16 to 30 days out: up to 15 days earlier.
    MediumPullIn,
    /// More than 30 days out: up to one month earlier.
    LongPullIn,
    /// Admin-cancelled appointment reactivated by its owner: any non-past date.
    Reactivation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleWindow {
    pub tier: WindowTier,
    pub days_remaining: i64,
    pub earliest: DateTime<Utc>,
    /// `false` only for [`WindowTier::ForwardOnly`], where the earliest bound is
    /// the current appointment date itself.
    pub earliest_inclusive: bool,
    pub latest: Option<DateTime<Utc>>,
}

impl RescheduleWindow {
    pub fn contains(&self, candidate: DateTime<Utc>) -> bool {
        let above = if self.earliest_inclusive {
            candidate >= self.earliest
        } else {
            candidate > self.earliest
        };
        let below = self.latest.map(|latest| candidate <= latest).unwrap_or(true);
        above && below
    }

    pub fn check(&self, candidate: DateTime<Utc>) -> Result<(), DomainError> {
        if self.contains(candidate) {
            return Ok(());
        }
        Err(DomainError::RescheduleOutOfRange {
            requested: candidate,
            earliest: self.earliest,
            latest: self.latest,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindowPolicy {
    /// How far past `now` a new date may be placed.
    pub horizon: Months,
}

impl Default for DateWindowPolicy {
    fn default() -> Self {
        Self { horizon: Months::new(12) }
    }
}

/// `ceil((original - now) / 1 day)`, computed on milliseconds.
pub fn days_remaining(original: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (original - now).num_milliseconds();
    let whole = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) == 0 {
        whole
    } else {
        whole + 1
    }
}

impl DateWindowPolicy {
    /// Allowed range for moving an appointment currently set for `original`.
    pub fn window(
        &self,
        original: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RescheduleWindow, DomainError> {
        let days_remaining = days_remaining(original, now);
        if days_remaining < MIN_LEAD_DAYS {
            return Err(DomainError::RescheduleTooLate { days_remaining });
        }

        let latest = Some(self.latest(now)?);
        let (tier, pulled_in, earliest_inclusive) = match days_remaining {
            i64::MIN..=10 => (WindowTier::ForwardOnly, original, false),
            11..=15 => (WindowTier::ShortPullIn, original - Duration::days(7), true),
            16..=30 => (WindowTier::MediumPullIn, original - Duration::days(15), true),
            _ => {
                let month_before = original.checked_sub_months(Months::new(1)).ok_or_else(|| {
                    DomainError::validation("requested_date", "appointment date is out of range")
                })?;
                (WindowTier::LongPullIn, month_before, true)
            }
        };

        // Never earlier than now, whatever the table allows.
        let (earliest, earliest_inclusive) = if pulled_in < now {
            (now, true)
        } else {
            (pulled_in, earliest_inclusive)
        };

        Ok(RescheduleWindow { tier, days_remaining, earliest, earliest_inclusive, latest })
    }

    /// Window for an admin-cancelled appointment being reactivated by its owner.
    /// The lead-time table does not apply; only past dates are refused.
    pub fn reactivation_window(
        &self,
        original: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RescheduleWindow {
        RescheduleWindow {
            tier: WindowTier::Reactivation,
            days_remaining: days_remaining(original, now),
            earliest: now,
            earliest_inclusive: true,
            latest: None,
        }
    }

    /// Full check of `candidate` against the window for `original`.
    pub fn evaluate(
        &self,
        original: DateTime<Utc>,
        candidate: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RescheduleWindow, DomainError> {
        let window = self.window(original, now)?;
        window.check(candidate)?;
        Ok(window)
    }

    fn latest(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        now.checked_add_months(self.horizon).ok_or_else(|| {
            DomainError::validation("requested_date", "reschedule horizon is out of range")
        })
    }
}

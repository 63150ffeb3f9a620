//! Working-day calendars and date arithmetic.
//!
//! Every duration and lag in the engine is a count of working days in some
//! calendar; this module is the only place that converts those counts to and
//! from actual dates. A schedule date is always a day-start point, and
//! activity spans are half-open: an activity of duration `n` starting at
//! point `s` occupies `n` working days in `[s, finish)`, where `finish` is
//! the morning after the last worked day.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Search horizon for the next/previous working day. A calendar that cannot
/// produce a working day within this many consecutive dates is unusable.
const MAX_SCAN_DAYS: u32 = 3660;

const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

/// Errors raised by working-date conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar '{calendar_id}' has no working day within {MAX_SCAN_DAYS} days of {from}")]
    NoWorkingTime { calendar_id: String, from: NaiveDate },
    #[error("activity '{activity_id}' references unknown calendar '{calendar_id}'")]
    Unresolved {
        activity_id: String,
        calendar_id: String,
    },
}

/// Working-time definition referenced by activities.
///
/// `working_days` is a Monday-first weekday mask; `exceptions` lists
/// explicit non-working dates (holidays, shutdowns) that override the mask.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    /// Monday..Sunday.
    pub working_days: [bool; 7],
    pub hours_per_day: f64,
    /// Non-working date exceptions.
    pub exceptions: Vec<NaiveDate>,
}

impl Calendar {
    /// Standard Monday-Friday calendar.
    pub fn five_day(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            working_days: [true, true, true, true, true, false, false],
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            exceptions: Vec::new(),
        }
    }

    /// Calendar with every day working (continuous operations).
    pub fn seven_day(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            working_days: [true; 7],
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            exceptions: Vec::new(),
        }
    }

    pub fn with_working_days(mut self, working_days: [bool; 7]) -> Self {
        self.working_days = working_days;
        self
    }

    pub fn with_hours_per_day(mut self, hours: f64) -> Self {
        self.hours_per_day = hours;
        self
    }

    pub fn with_exception(mut self, date: NaiveDate) -> Self {
        self.exceptions.push(date);
        self
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days[date.weekday().num_days_from_monday() as usize]
            && !self.exceptions.contains(&date)
    }

    /// Nearest working day at or after `date`.
    pub fn roll_forward(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let mut d = date;
        for _ in 0..MAX_SCAN_DAYS {
            if self.is_working_day(d) {
                return Ok(d);
            }
            d = d.succ_opt().ok_or_else(|| self.no_working_time(date))?;
        }
        Err(self.no_working_time(date))
    }

    /// Nearest working day at or before `date`.
    pub fn roll_back(&self, date: NaiveDate) -> Result<NaiveDate, CalendarError> {
        let mut d = date;
        for _ in 0..MAX_SCAN_DAYS {
            if self.is_working_day(d) {
                return Ok(d);
            }
            d = d.pred_opt().ok_or_else(|| self.no_working_time(date))?;
        }
        Err(self.no_working_time(date))
    }

    /// Moves a day-start point by `n` working days (signed).
    ///
    /// The point is first normalized to a working morning; `n == 0` is
    /// exactly that normalization.
    pub fn add_working_days(&self, date: NaiveDate, n: i64) -> Result<NaiveDate, CalendarError> {
        let mut d = self.roll_forward(date)?;
        if n >= 0 {
            for _ in 0..n {
                let next = d.succ_opt().ok_or_else(|| self.no_working_time(date))?;
                d = self.roll_forward(next)?;
            }
        } else {
            for _ in 0..(-n) {
                let prev = d.pred_opt().ok_or_else(|| self.no_working_time(date))?;
                d = self.roll_back(prev)?;
            }
        }
        Ok(d)
    }

    /// Working days in the half-open range `[a, b)`; negative when `b < a`.
    pub fn working_days_between(&self, a: NaiveDate, b: NaiveDate) -> i64 {
        if b < a {
            return -self.working_days_between(b, a);
        }
        let mut count = 0;
        let mut d = a;
        while d < b {
            if self.is_working_day(d) {
                count += 1;
            }
            match d.succ_opt() {
                Some(next) => d = next,
                None => break,
            }
        }
        count
    }

    /// Converts an hour-denominated duration to whole working days, rounding
    /// up. Used at the parser boundary for sources that store hours.
    pub fn days_from_hours(&self, hours: f64) -> i64 {
        let per_day = if self.hours_per_day > 0.0 {
            self.hours_per_day
        } else {
            DEFAULT_HOURS_PER_DAY
        };
        (hours / per_day).ceil() as i64
    }

    fn no_working_time(&self, from: NaiveDate) -> CalendarError {
        CalendarError::NoWorkingTime {
            calendar_id: self.id.clone(),
            from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekday_mask() {
        let cal = Calendar::five_day("cal");
        assert!(cal.is_working_day(d(2025, 1, 6))); // Monday
        assert!(cal.is_working_day(d(2025, 1, 10))); // Friday
        assert!(!cal.is_working_day(d(2025, 1, 11))); // Saturday
        assert!(!cal.is_working_day(d(2025, 1, 12))); // Sunday
    }

    #[test]
    fn test_exception_overrides_mask() {
        let cal = Calendar::five_day("cal").with_exception(d(2025, 1, 6));
        assert!(!cal.is_working_day(d(2025, 1, 6)));
        assert!(cal.is_working_day(d(2025, 1, 7)));
    }

    #[test]
    fn test_roll_forward_over_weekend() {
        let cal = Calendar::five_day("cal");
        assert_eq!(cal.roll_forward(d(2025, 1, 11)).unwrap(), d(2025, 1, 13));
        assert_eq!(cal.roll_forward(d(2025, 1, 8)).unwrap(), d(2025, 1, 8));
    }

    #[test]
    fn test_roll_back() {
        let cal = Calendar::five_day("cal");
        assert_eq!(cal.roll_back(d(2025, 1, 12)).unwrap(), d(2025, 1, 10));
    }

    #[test]
    fn test_add_working_days_crosses_weekend() {
        let cal = Calendar::five_day("cal");
        // Thursday + 2 working days lands on Monday.
        assert_eq!(cal.add_working_days(d(2025, 1, 9), 2).unwrap(), d(2025, 1, 13));
        // Zero normalizes to a working morning.
        assert_eq!(cal.add_working_days(d(2025, 1, 11), 0).unwrap(), d(2025, 1, 13));
    }

    #[test]
    fn test_add_working_days_backward() {
        let cal = Calendar::five_day("cal");
        // Monday - 1 working day is Friday.
        assert_eq!(cal.add_working_days(d(2025, 1, 13), -1).unwrap(), d(2025, 1, 10));
        assert_eq!(cal.add_working_days(d(2025, 1, 13), -5).unwrap(), d(2025, 1, 6));
    }

    #[test]
    fn test_working_days_between() {
        let cal = Calendar::five_day("cal");
        // Mon 6th .. Mon 13th: five working days in [6, 13).
        assert_eq!(cal.working_days_between(d(2025, 1, 6), d(2025, 1, 13)), 5);
        assert_eq!(cal.working_days_between(d(2025, 1, 13), d(2025, 1, 6)), -5);
        assert_eq!(cal.working_days_between(d(2025, 1, 6), d(2025, 1, 6)), 0);
    }

    #[test]
    fn test_add_then_measure_is_consistent() {
        let cal = Calendar::five_day("cal").with_exception(d(2025, 1, 8));
        let start = d(2025, 1, 6);
        let end = cal.add_working_days(start, 7).unwrap();
        assert_eq!(cal.working_days_between(start, end), 7);
    }

    #[test]
    fn test_no_working_time() {
        let cal = Calendar::five_day("dead").with_working_days([false; 7]);
        let err = cal.roll_forward(d(2025, 1, 6)).unwrap_err();
        assert!(matches!(err, CalendarError::NoWorkingTime { .. }));
    }

    #[test]
    fn test_days_from_hours() {
        let cal = Calendar::five_day("cal");
        assert_eq!(cal.days_from_hours(40.0), 5);
        assert_eq!(cal.days_from_hours(41.0), 6);
        assert_eq!(cal.days_from_hours(0.0), 0);
    }
}

//! Arrival estimation for the remaining stops of a route-day.
//!
//! The heuristic is deliberately simple: the first remaining stop is
//! reached `first_stop_minutes` from now and every stop after it adds
//! `per_stop_minutes`. Late risk compares the estimated arrival's
//! minute-of-day against the service window end as integers; the old
//! formatted-string comparison only worked while every time happened to be
//! zero-padded.

use crate::config::RouteConfig;
use crate::error::{AppError, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone, Copy)]
pub struct EtaParams {
    pub first_stop: Duration,
    pub per_stop: Duration,
}

impl EtaParams {
    pub fn from_config(config: &RouteConfig) -> Self {
        Self {
            first_stop: Duration::minutes(config.first_stop_minutes),
            per_stop: Duration::minutes(config.per_stop_minutes),
        }
    }
}

impl Default for EtaParams {
    fn default() -> Self {
        Self {
            first_stop: Duration::minutes(18),
            per_stop: Duration::minutes(12),
        }
    }
}

/// Estimated arrival times for the remaining stops, in visiting order.
/// Index 0 is `now + first_stop`; index i is `now + first_stop + per_stop * i`.
pub fn estimated_arrivals(
    now: NaiveDateTime,
    remaining: usize,
    params: &EtaParams,
) -> impl Iterator<Item = NaiveDateTime> + '_ {
    (0..remaining as i32).map(move |i| now + params.first_stop + params.per_stop * i)
}

/// Minutes since midnight. The late-risk decision happens in this space so
/// "9:05" and "14:30" compare as times, not as strings.
pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Whether an estimated arrival lands past the service window end.
pub fn has_late_risk(eta: NaiveDateTime, window_end: NaiveTime) -> bool {
    minute_of_day(eta.time()) > minute_of_day(window_end)
}

/// Position of a wall-clock time relative to a service window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    Before,
    Within,
    After,
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ServiceWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn position(&self, time: NaiveTime) -> WindowPosition {
        let t = minute_of_day(time);
        if t < minute_of_day(self.start) {
            WindowPosition::Before
        } else if t > minute_of_day(self.end) {
            WindowPosition::After
        } else {
            WindowPosition::Within
        }
    }
}

/// Parses an "HH:MM" wall-clock string as used in config files and the
/// original route payloads. Accepts a single-digit hour.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| AppError::BadRequest(format!("invalid time '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn first_stop_is_eighteen_minutes_out() {
        let etas: Vec<_> = estimated_arrivals(at(11, 0), 1, &EtaParams::default()).collect();
        assert_eq!(etas, vec![at(11, 18)]);
    }

    #[test]
    fn arrivals_increase_by_twelve_minutes_after_the_first() {
        let etas: Vec<_> = estimated_arrivals(at(11, 0), 5, &EtaParams::default()).collect();
        assert_eq!(etas.len(), 5);
        assert_eq!(etas[0], at(11, 18));
        for pair in etas.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(12));
        }
    }

    #[test]
    fn no_remaining_stops_yields_no_arrivals() {
        assert_eq!(
            estimated_arrivals(at(11, 0), 0, &EtaParams::default()).count(),
            0
        );
    }

    #[test]
    fn arrival_past_window_end_is_late_risk() {
        let end = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert!(has_late_risk(at(15, 0), end));
        assert!(!has_late_risk(at(14, 30), end));
    }

    #[test]
    fn single_digit_hour_compares_as_time_not_as_string() {
        // Lexically "9:05" > "14:30"; as minutes of day it is far earlier.
        let end = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert!(!has_late_risk(at(9, 5), end));
    }

    #[test]
    fn window_position_brackets_the_day() {
        let window = ServiceWindow::new(
            NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        );
        assert_eq!(
            window.position(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            WindowPosition::Before
        );
        assert_eq!(
            window.position(NaiveTime::from_hms_opt(11, 30, 0).unwrap()),
            WindowPosition::Within
        );
        assert_eq!(
            window.position(NaiveTime::from_hms_opt(14, 31, 0).unwrap()),
            WindowPosition::After
        );
    }

    #[test]
    fn parse_hhmm_accepts_padded_and_single_digit_hours() {
        assert_eq!(
            parse_hhmm("09:05").unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0).unwrap()
        );
        assert_eq!(
            parse_hhmm("9:05").unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0).unwrap()
        );
        assert!(parse_hhmm("25:00").is_err());
    }
}

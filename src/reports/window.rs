//! Report window resolution.
//!
//! All arithmetic happens on the caller's local civil calendar, using naive
//! date-times. "End of day" is the last nanosecond before the next midnight.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::report::DateRangeRequest;

/// Dates before this year are treated as uninitialized input.
const MIN_YEAR: i32 = 1900;
/// Upper bound of a four-digit year. Anything later is a typo or an attack.
const MAX_YEAR: i32 = 9999;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("invalid period: {0}")]
    InvalidPeriod(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("either period or both from_date and to_date are required")]
    MissingDateRange,
    #[error("from_date cannot be after to_date")]
    InvertedRange,
    #[error("to_date cannot be in the future")]
    FutureDate,
    #[error("date range cannot go back more than {max_months} months")]
    WindowTooWide { max_months: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    SevenDays,
    ThirtyDays,
    ThreeMonths,
    CurrentMonth,
    LastMonth,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::SevenDays,
        Period::ThirtyDays,
        Period::ThreeMonths,
        Period::CurrentMonth,
        Period::LastMonth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::SevenDays => "7days",
            Period::ThirtyDays => "30days",
            Period::ThreeMonths => "3months",
            Period::CurrentMonth => "currentmonth",
            Period::LastMonth => "lastmonth",
        }
    }
}

impl FromStr for Period {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| WindowError::InvalidPeriod(s.to_string()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive `[from, to]` range in local civil time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

/// Source of "now" for window resolution.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// The last nanosecond of `date`. Saturates at the calendar's upper bound.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.succ_opt()
        .map(|next| start_of_day(next) - Duration::nanoseconds(1))
        .unwrap_or(NaiveDateTime::MAX)
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    days_before(date, u64::from(date.day0()))
}

fn first_of_previous_month(date: NaiveDate) -> NaiveDate {
    first_of_month(days_before(first_of_month(date), 1))
}

impl Period {
    pub fn window(&self, now: NaiveDateTime) -> ReportWindow {
        let today = now.date();
        let to = end_of_day(today);

        match self {
            Period::SevenDays => ReportWindow {
                from: start_of_day(days_before(today, 6)),
                to,
            },
            Period::ThirtyDays => ReportWindow {
                from: start_of_day(days_before(today, 29)),
                to,
            },
            Period::ThreeMonths => ReportWindow {
                from: start_of_day(first_of_previous_month(first_of_previous_month(today))),
                to,
            },
            Period::CurrentMonth => ReportWindow {
                from: start_of_day(first_of_month(today)),
                to,
            },
            Period::LastMonth => ReportWindow {
                from: start_of_day(first_of_previous_month(today)),
                to: end_of_day(days_before(first_of_month(today), 1)),
            },
        }
    }
}

/// Turns a request into a window. A period, when present, wins over dates.
pub fn resolve(request: &DateRangeRequest, now: NaiveDateTime) -> Result<ReportWindow, WindowError> {
    if let Some(period) = request.period() {
        let period: Period = period.parse()?;
        return Ok(period.window(now));
    }

    let from = parse_date(request.from_date.as_deref())?;
    let to = parse_date(request.to_date.as_deref())?;

    let (Some(from), Some(to)) = (from, to) else {
        return Err(WindowError::MissingDateRange);
    };

    for value in [from, to] {
        if !(MIN_YEAR..=MAX_YEAR).contains(&value.year()) {
            return Err(WindowError::InvalidDate(value.date().to_string()));
        }
    }

    Ok(ReportWindow {
        from: start_of_day(from.date()),
        to: end_of_day(to.date()),
    })
}

/// Checks run independently, in this order: inverted, future, too wide.
pub fn validate_window(window: &ReportWindow, now: NaiveDateTime, max_months: u32) -> Result<(), WindowError> {
    if window.from > window.to {
        return Err(WindowError::InvertedRange);
    }

    if window.to > end_of_day(now.date()) {
        return Err(WindowError::FutureDate);
    }

    let earliest = now
        .date()
        .checked_sub_months(Months::new(max_months))
        .map(start_of_day)
        .unwrap_or(NaiveDateTime::MIN);
    if window.from < earliest {
        return Err(WindowError::WindowTooWide { max_months });
    }

    Ok(())
}

/// Accepts `YYYY-MM-DD`, a naive `YYYY-MM-DDTHH:MM:SS` or RFC 3339 (whose
/// own civil time is kept). Blank and the zero date `0001-01-01` are absent.
fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDateTime>, WindowError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let parsed = if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        start_of_day(date)
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        naive
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.naive_local()
    } else {
        return Err(WindowError::InvalidDate(raw.to_string()));
    };

    let zero = NaiveDate::from_ymd_opt(1, 1, 1).map(start_of_day);
    if Some(parsed) == zero {
        return Ok(None);
    }

    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn day_start(y: i32, m: u32, d: u32) -> NaiveDateTime {
        start_of_day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn day_end(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_nano_opt(23, 59, 59, 999_999_999)
            .unwrap()
    }

    #[test]
    fn current_month_on_march_fifteenth() {
        let window = resolve(&DateRangeRequest::for_period("currentmonth"), at(2024, 3, 15)).unwrap();
        assert_eq!(window.from, day_start(2024, 3, 1));
        assert_eq!(window.to, day_end(2024, 3, 15));
    }

    #[test]
    fn rolling_periods_include_today() {
        let now = at(2024, 3, 15);
        let seven = Period::SevenDays.window(now);
        let thirty = Period::ThirtyDays.window(now);
        let three = Period::ThreeMonths.window(now);

        assert_eq!(seven.from, day_start(2024, 3, 9));
        assert_eq!(thirty.from, day_start(2024, 2, 15));
        assert_eq!(three.from, day_start(2024, 1, 1));
        for w in [seven, thirty, three] {
            assert_eq!(w.to, day_end(2024, 3, 15));
        }
    }

    #[test]
    fn three_months_crosses_year_boundary() {
        assert_eq!(Period::ThreeMonths.window(at(2024, 2, 10)).from, day_start(2023, 12, 1));
    }

    #[test]
    fn last_month_stays_inside_previous_month() {
        for now in [at(2024, 3, 1), at(2024, 3, 31), at(2024, 1, 10), at(2023, 5, 31)] {
            let window = Period::LastMonth.window(now);
            let expected_month = if now.month() == 1 { 12 } else { now.month() - 1 };

            assert_eq!(window.from.day(), 1);
            assert_eq!(window.from.month(), expected_month);
            assert_eq!(window.to.month(), expected_month);
            assert!(window.from <= window.to);
        }

        let feb = Period::LastMonth.window(at(2024, 3, 31));
        assert_eq!(feb.to, day_end(2024, 2, 29));
    }

    #[test]
    fn every_period_is_deterministic_and_ordered() {
        let now = at(2024, 7, 4);
        for period in Period::ALL {
            let a = period.window(now);
            let b = resolve(&DateRangeRequest::for_period(period.as_str()), now).unwrap();
            assert_eq!(a, b);
            assert!(a.from <= a.to, "{period}");
        }
    }

    #[test]
    fn explicit_dates_cover_full_days() {
        let req = DateRangeRequest::between("2024-02-03T15:00:00", "2024-02-10");
        let window = resolve(&req, at(2024, 3, 15)).unwrap();
        assert_eq!(window.from, day_start(2024, 2, 3));
        assert_eq!(window.to, day_end(2024, 2, 10));
    }

    #[test]
    fn rfc3339_keeps_its_civil_date() {
        let req = DateRangeRequest::between("2024-02-03T23:30:00+07:00", "2024-02-04T01:00:00+07:00");
        let window = resolve(&req, at(2024, 3, 15)).unwrap();
        assert_eq!(window.from, day_start(2024, 2, 3));
        assert_eq!(window.to, day_end(2024, 2, 4));
    }

    #[test]
    fn period_takes_precedence_over_dates() {
        let mut req = DateRangeRequest::between("2020-01-01", "2020-01-02");
        req.period = Some("currentmonth".to_string());
        let window = resolve(&req, at(2024, 3, 15)).unwrap();
        assert_eq!(window.from, day_start(2024, 3, 1));
    }

    #[test]
    fn unknown_period_is_rejected() {
        let err = resolve(&DateRangeRequest::for_period("fortnight"), at(2024, 3, 15)).unwrap_err();
        assert_eq!(err, WindowError::InvalidPeriod("fortnight".to_string()));
    }

    #[test]
    fn incomplete_pair_is_missing() {
        let req = DateRangeRequest {
            from_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve(&req, at(2024, 3, 15)).unwrap_err(), WindowError::MissingDateRange);
        assert_eq!(
            resolve(&DateRangeRequest::default(), at(2024, 3, 15)).unwrap_err(),
            WindowError::MissingDateRange
        );
    }

    #[test]
    fn zero_date_counts_as_missing() {
        let req = DateRangeRequest::between("0001-01-01", "2024-01-31");
        assert_eq!(resolve(&req, at(2024, 3, 15)).unwrap_err(), WindowError::MissingDateRange);
    }

    #[test]
    fn ancient_or_garbled_dates_are_invalid() {
        let ancient = DateRangeRequest::between("1899-12-31", "2024-01-31");
        assert!(matches!(resolve(&ancient, at(2024, 3, 15)), Err(WindowError::InvalidDate(_))));

        let garbled = DateRangeRequest::between("31/01/2024", "2024-01-31");
        assert!(matches!(resolve(&garbled, at(2024, 3, 15)), Err(WindowError::InvalidDate(_))));
    }

    #[test]
    fn inverted_range_alone() {
        let window = ReportWindow {
            from: day_start(2024, 3, 10),
            to: day_end(2024, 3, 5),
        };
        assert_eq!(validate_window(&window, at(2024, 3, 15), 6), Err(WindowError::InvertedRange));
    }

    #[test]
    fn future_end_alone() {
        let window = ReportWindow {
            from: day_start(2024, 3, 10),
            to: day_end(2024, 3, 16),
        };
        assert_eq!(validate_window(&window, at(2024, 3, 15), 6), Err(WindowError::FutureDate));

        let today = ReportWindow {
            from: day_start(2024, 3, 10),
            to: day_end(2024, 3, 15),
        };
        assert_eq!(validate_window(&today, at(2024, 3, 15), 6), Ok(()));
    }

    #[test]
    fn too_wide_alone() {
        let req = DateRangeRequest::between("2023-01-01", "2023-01-31");
        let now = day_start(2024, 1, 1);
        let window = resolve(&req, now).unwrap();

        assert_eq!(
            validate_window(&window, now, 6),
            Err(WindowError::WindowTooWide { max_months: 6 })
        );
        assert_eq!(validate_window(&window, now, 12), Ok(()));
    }

    #[test]
    fn lookback_boundary_is_inclusive() {
        let window = ReportWindow {
            from: day_start(2023, 9, 15),
            to: day_end(2023, 9, 20),
        };
        assert_eq!(validate_window(&window, at(2024, 3, 15), 6), Ok(()));
    }

    #[test]
    fn lookback_clamps_to_month_end() {
        // Aug 31 minus six months is Feb 29, not Mar 2
        let now = at(2024, 8, 31);
        let on_bound = ReportWindow {
            from: day_start(2024, 2, 29),
            to: day_end(2024, 3, 10),
        };
        assert_eq!(validate_window(&on_bound, now, 6), Ok(()));

        let before_bound = ReportWindow {
            from: day_start(2024, 2, 28),
            to: day_end(2024, 3, 10),
        };
        assert_eq!(
            validate_window(&before_bound, now, 6),
            Err(WindowError::WindowTooWide { max_months: 6 })
        );
    }

    #[test]
    fn far_future_year_is_invalid_not_a_panic() {
        let req = DateRangeRequest::between("2024-03-01", "+262142-12-31");
        assert!(matches!(resolve(&req, at(2024, 3, 15)), Err(WindowError::InvalidDate(_))));

        let five_digits = DateRangeRequest::between("2024-03-01", "10000-01-01");
        assert!(matches!(resolve(&five_digits, at(2024, 3, 15)), Err(WindowError::InvalidDate(_))));
    }

    #[test]
    fn calendar_edges_saturate() {
        assert_eq!(end_of_day(NaiveDate::MAX), NaiveDateTime::MAX);

        let earliest = start_of_day(NaiveDate::MIN);
        for period in Period::ALL {
            let window = period.window(earliest);
            assert!(window.from <= window.to, "{period}");
        }
    }
}

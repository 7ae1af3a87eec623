//! Bounded date-list generation for history queries.
//!
//! The cloud API is queried one day at a time, so every bulk operation
//! starts from a list of dates. [`DateList`] builds such a list from any
//! combination of explicit start/end dates, a day limit, and a [`Span`]
//! keyword, clamping to yesterday (or today) so incomplete days are not
//! queried by accident.

use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while building a date list or query window.
#[derive(Debug, Error)]
pub enum DateRangeError {
    /// The span keyword was not recognised.
    #[error("Unknown span: '{0}'. Expected 'day', '2days', 'weekday', 'week', 'month', or 'year'")]
    UnknownSpan(String),

    /// A date arithmetic step left the supported range.
    #[error("Date out of range: {0}")]
    OutOfRange(String),

    /// A local timestamp could not be resolved (nonexistent during a DST gap).
    #[error("Local time does not exist: {0}")]
    NonexistentLocalTime(NaiveDateTime),
}

/// A relative date window selected by keyword instead of explicit dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Span {
    /// A single day.
    Day,
    /// Two consecutive days, e.g. yesterday and today.
    TwoDays,
    /// The last 8 occurrences of the same weekday (49 days, stepping by 7).
    Weekday,
    /// Seven consecutive days.
    Week,
    /// The days of one calendar month.
    Month,
    /// The days of one year.
    Year,
}

impl Span {
    /// Returns the keyword form of this span.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::TwoDays => "2days",
            Self::Weekday => "weekday",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Span {
    type Err = DateRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "2days" => Ok(Self::TwoDays),
            "weekday" => Ok(Self::Weekday),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(DateRangeError::UnknownSpan(other.to_string())),
        }
    }
}

/// The latest date a list is allowed to reach.
///
/// Data for the current day is incomplete until midnight, so lists end
/// at yesterday unless today (or an arbitrary future date) is asked for
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Latest {
    /// Clamp to yesterday (the default).
    #[default]
    Yesterday,
    /// Allow today as the final date.
    Today,
    /// Do not clamp at all; future dates pass through.
    Unclamped,
}

/// Builder for a bounded list of dates.
///
/// # Example
///
/// ```
/// use shared::daterange::{DateList, Span};
///
/// // The calendar month containing 2024-02-05 (a leap February).
/// let days = DateList::new()
///     .start("2024-02-05".parse().unwrap())
///     .span(Span::Month)
///     .build()
///     .unwrap();
///
/// assert_eq!(days.len(), 29);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DateList {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    limit: Option<usize>,
    span: Option<Span>,
    latest: Latest,
}

impl DateList {
    /// Creates an empty builder. With no other settings, [`build`](Self::build)
    /// yields a single date: yesterday.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first date of the range.
    #[must_use]
    pub fn start(mut self, date: NaiveDate) -> Self {
        self.start = Some(date);
        self
    }

    /// Sets the last date of the range.
    #[must_use]
    pub fn end(mut self, date: NaiveDate) -> Self {
        self.end = Some(date);
        self
    }

    /// Caps the number of dates produced. Defaults to 200, or 366 when a
    /// span is set.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Selects a relative window instead of an explicit start/end pair.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Sets the clamping behavior for the final date.
    #[must_use]
    pub fn latest(mut self, latest: Latest) -> Self {
        self.latest = latest;
        self
    }

    /// Builds the date list relative to the local calendar date.
    ///
    /// # Errors
    ///
    /// Returns an error if date arithmetic leaves the representable range.
    pub fn build(self) -> Result<Vec<NaiveDate>, DateRangeError> {
        let today = Local::now().date_naive();
        self.build_from(today)
    }

    /// Builds the date list as of the given calendar date. Used by
    /// [`build`](Self::build) and directly by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if date arithmetic leaves the representable range.
    pub fn build_from(self, today: NaiveDate) -> Result<Vec<NaiveDate>, DateRangeError> {
        let latest_date = match self.latest {
            Latest::Yesterday => prev_day(today)?,
            Latest::Today | Latest::Unclamped => today,
        };
        let clamp = |d: NaiveDate| {
            if d > latest_date && self.latest != Latest::Unclamped {
                latest_date
            } else {
                d
            }
        };

        let mut first = self.start;
        let mut last = self.end.map(clamp);
        let mut step: u64 = 1;
        let mut limit = self.limit;

        if first.is_none() && last.is_none() {
            last = Some(latest_date);
        }

        if let Some(span) = self.span {
            limit = Some(limit.unwrap_or(366));
            match span {
                Span::Day => limit = Some(1),
                Span::TwoDays => {
                    if let Some(f) = first {
                        last = Some(add_days(f, 1)?);
                    } else if let Some(l) = last {
                        first = Some(sub_days(l, 1)?);
                    }
                }
                Span::Weekday => {
                    if let Some(f) = first {
                        last = Some(add_days(f, 49)?);
                    } else if let Some(l) = last {
                        first = Some(sub_days(l, 49)?);
                    }
                    step = 7;
                }
                Span::Week => {
                    if let Some(f) = first {
                        last = Some(add_days(f, 6)?);
                    } else if let Some(l) = last {
                        first = Some(sub_days(l, 6)?);
                    }
                }
                Span::Month => {
                    if let Some(f) = first {
                        let days = u64::from(days_in_month(f)) - 1;
                        last = Some(add_days(f, days)?);
                    } else if let Some(l) = last {
                        let prev = sub_days(l.with_day(1).unwrap_or(l), 1)?;
                        let days = u64::from(prev.day()) - 1;
                        first = Some(sub_days(l, days)?);
                    }
                }
                Span::Year => {
                    if let Some(f) = first {
                        let days = days_to_next_year(f)? - 1;
                        last = Some(add_days(f, days)?);
                    } else if let Some(l) = last {
                        let days = days_from_prev_year(l)? - 1;
                        first = Some(sub_days(l, days)?);
                    }
                }
            }
        } else {
            limit = Some(match limit {
                Some(n) if n >= 1 => n,
                _ => 200,
            });
        }
        let limit = limit.unwrap_or(200);

        let last = clamp(last.unwrap_or(latest_date));
        let d = clamp(first.unwrap_or(latest_date));
        let (mut d, last) = if d > last { (last, d) } else { (d, last) };

        let mut list = vec![d];
        while d < last && list.len() < limit {
            d = add_days(d, step)?;
            list.push(d);
        }
        Ok(list)
    }
}

/// Returns the millisecond epoch window `(begin, end)` covering a whole
/// local calendar day, ending at the following midnight.
///
/// # Errors
///
/// Returns an error if midnight does not exist locally (DST gap) or the
/// date is out of range.
pub fn day_window(date: NaiveDate) -> Result<(i64, i64), DateRangeError> {
    let begin = local_millis(midnight(date)?)?;
    let end = local_millis(midnight(add_days(date, 1)?)?)?;
    Ok((begin, end))
}

/// Returns the millisecond epoch window `(begin, end)` covering one hour
/// from the given local time.
///
/// # Errors
///
/// Returns an error if the local time does not exist (DST gap).
pub fn hour_window(start: NaiveDateTime) -> Result<(i64, i64), DateRangeError> {
    let begin = local_millis(start)?;
    Ok((begin, begin + 3_600_000))
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime, DateRangeError> {
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| DateRangeError::OutOfRange(date.to_string()))
}

fn local_millis(naive: NaiveDateTime) -> Result<i64, DateRangeError> {
    // During a DST fold the earlier instant is taken.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or(DateRangeError::NonexistentLocalTime(naive))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, DateRangeError> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| DateRangeError::OutOfRange(date.to_string()))
}

fn sub_days(date: NaiveDate, days: u64) -> Result<NaiveDate, DateRangeError> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| DateRangeError::OutOfRange(date.to_string()))
}

fn prev_day(date: NaiveDate) -> Result<NaiveDate, DateRangeError> {
    sub_days(date, 1)
}

/// Number of days in the month containing `date`.
fn days_in_month(date: NaiveDate) -> u32 {
    let next_month = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    match next_month {
        Some(first_of_next) => first_of_next.pred_opt().map_or(31, |d| d.day()),
        None => 31,
    }
}

/// Days from `date` to the same calendar day next year. A Feb 29 anchor
/// lands on Feb 28.
fn days_to_next_year(date: NaiveDate) -> Result<u64, DateRangeError> {
    let day = if date.month() == 2 && date.day() == 29 {
        28
    } else {
        date.day()
    };
    let next = NaiveDate::from_ymd_opt(date.year() + 1, date.month(), day)
        .ok_or_else(|| DateRangeError::OutOfRange(date.to_string()))?;
    Ok(u64::try_from((next - date).num_days()).unwrap_or(365))
}

/// Days from the same calendar day last year up to `date`.
fn days_from_prev_year(date: NaiveDate) -> Result<u64, DateRangeError> {
    let day = if date.month() == 2 && date.day() == 29 {
        28
    } else {
        date.day()
    };
    let prev = NaiveDate::from_ymd_opt(date.year() - 1, date.month(), day)
        .ok_or_else(|| DateRangeError::OutOfRange(date.to_string()))?;
    Ok(u64::try_from((date - prev).num_days()).unwrap_or(365))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_is_yesterday() {
        let days = DateList::new().build_from(date("2024-03-15")).unwrap();
        assert_eq!(days, vec![date("2024-03-14")]);
    }

    #[test]
    fn test_today_latest_includes_today() {
        let days = DateList::new()
            .latest(Latest::Today)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days, vec![date("2024-03-15")]);
    }

    #[test]
    fn test_explicit_range() {
        let days = DateList::new()
            .start(date("2024-03-01"))
            .end(date("2024-03-04"))
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(
            days,
            vec![
                date("2024-03-01"),
                date("2024-03-02"),
                date("2024-03-03"),
                date("2024-03-04"),
            ]
        );
    }

    #[test]
    fn test_reversed_range_is_swapped() {
        let days = DateList::new()
            .start(date("2024-03-04"))
            .end(date("2024-03-01"))
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days.first(), Some(&date("2024-03-01")));
        assert_eq!(days.last(), Some(&date("2024-03-04")));
    }

    #[test]
    fn test_end_clamped_to_yesterday() {
        let days = DateList::new()
            .start(date("2024-03-13"))
            .end(date("2024-03-20"))
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days, vec![date("2024-03-13"), date("2024-03-14")]);
    }

    #[test]
    fn test_unclamped_allows_future_dates() {
        let days = DateList::new()
            .start(date("2024-03-20"))
            .end(date("2024-03-22"))
            .latest(Latest::Unclamped)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], date("2024-03-20"));
    }

    #[test]
    fn test_limit_truncates() {
        let days = DateList::new()
            .start(date("2024-01-01"))
            .end(date("2024-03-01"))
            .limit(5)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(days.last(), Some(&date("2024-01-05")));
    }

    #[test]
    fn test_span_day() {
        let days = DateList::new()
            .start(date("2024-03-10"))
            .span(Span::Day)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days, vec![date("2024-03-10")]);
    }

    #[test]
    fn test_span_two_days_default_window() {
        // No explicit dates: yesterday and today.
        let days = DateList::new()
            .span(Span::TwoDays)
            .latest(Latest::Today)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days, vec![date("2024-03-14"), date("2024-03-15")]);
    }

    #[test]
    fn test_span_week_from_end() {
        let days = DateList::new()
            .end(date("2024-03-10"))
            .span(Span::Week)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date("2024-03-04"));
        assert_eq!(days[6], date("2024-03-10"));
    }

    #[test]
    fn test_span_weekday_steps_by_seven() {
        let days = DateList::new()
            .end(date("2024-03-10"))
            .span(Span::Weekday)
            .build_from(date("2024-03-15"))
            .unwrap();
        assert_eq!(days.len(), 8);
        assert_eq!(days[0], date("2024-01-21"));
        assert_eq!(days[7], date("2024-03-10"));
        assert!(days.windows(2).all(|w| (w[1] - w[0]).num_days() == 7));
    }

    #[test]
    fn test_span_month_leap_february() {
        let days = DateList::new()
            .start(date("2024-02-01"))
            .span(Span::Month)
            .build_from(date("2024-06-01"))
            .unwrap();
        assert_eq!(days.len(), 29);
        assert_eq!(days.last(), Some(&date("2024-02-29")));
    }

    #[test]
    fn test_span_month_from_end_uses_previous_month_length() {
        let days = DateList::new()
            .end(date("2024-03-05"))
            .span(Span::Month)
            .build_from(date("2024-06-01"))
            .unwrap();
        // February 2024 has 29 days.
        assert_eq!(days.len(), 29);
        assert_eq!(days[0], date("2024-02-06"));
    }

    #[test]
    fn test_span_year() {
        let days = DateList::new()
            .start(date("2023-01-01"))
            .span(Span::Year)
            .build_from(date("2024-06-01"))
            .unwrap();
        assert_eq!(days.len(), 365);
        assert_eq!(days.last(), Some(&date("2023-12-31")));
    }

    #[test]
    fn test_span_year_leap_day_anchor() {
        let days = DateList::new()
            .start(date("2024-02-29"))
            .span(Span::Year)
            .latest(Latest::Unclamped)
            .build_from(date("2024-03-01"))
            .unwrap();
        assert_eq!(days[0], date("2024-02-29"));
        assert_eq!(days.last(), Some(&date("2025-02-27")));
    }

    #[test]
    fn test_span_parse() {
        assert_eq!("day".parse::<Span>().unwrap(), Span::Day);
        assert_eq!("2Days".parse::<Span>().unwrap(), Span::TwoDays);
        assert_eq!("WEEK".parse::<Span>().unwrap(), Span::Week);
        assert!("fortnight".parse::<Span>().is_err());
    }

    #[test]
    fn test_span_display_round_trip() {
        for span in [
            Span::Day,
            Span::TwoDays,
            Span::Weekday,
            Span::Week,
            Span::Month,
            Span::Year,
        ] {
            assert_eq!(span.to_string().parse::<Span>().unwrap(), span);
        }
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(date("2024-02-10")), 29);
        assert_eq!(days_in_month(date("2023-02-10")), 28);
        assert_eq!(days_in_month(date("2024-12-25")), 31);
        assert_eq!(days_in_month(date("2024-04-01")), 30);
    }

    #[test]
    fn test_day_window_spans_24_hours() {
        // Away from DST transitions a day is exactly 24h.
        let (begin, end) = day_window(date("2024-01-10")).unwrap();
        assert_eq!(end - begin, 24 * 3_600_000);
    }

    #[test]
    fn test_hour_window() {
        let start = date("2024-01-10").and_hms_opt(12, 0, 0).unwrap();
        let (begin, end) = hour_window(start).unwrap();
        assert_eq!(end - begin, 3_600_000);
    }
}

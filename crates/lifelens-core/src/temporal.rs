//! Relative time expression parsing for temporal media filtering.
//!
//! Maps phrases such as `"3 days ago"`, `"yesterday"` or `"last month"` to an
//! absolute UTC [`TimeRange`] anchored at a caller-supplied `now`. Parsing is
//! total: anything unrecognized resolves to the trailing 24 hours.
//!
//! # Grammar
//!
//! | Expression | Range |
//! |------------|-------|
//! | `<n> <unit> ago` | `now - n*unit` to `now` (month = 30 days, year = 365 days) |
//! | `today` | midnight to `now` |
//! | `yesterday` | the whole previous day |
//! | `this week` / `this month` / `this year` | start of the period to `now` |
//! | `last week` | previous Monday 00:00 to Sunday 23:59:59.999999 |
//! | `last month` | the whole previous calendar month |
//! | `last year` | the whole previous calendar year |
//!
//! Units accept an optional plural `s`: second, minute, hour, day, week,
//! month, year.
//!
//! A [`TimeOfDay`] bucket can then narrow a resolved range: the start moves
//! to the bucket start on the start's day and the end to the bucket end on
//! the end's day.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::TimeRange;

// =============================================================================
// UNITS
// =============================================================================

/// Unit in a `<n> <unit> ago` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    /// Approximated as 30 days.
    Month,
    /// Approximated as 365 days.
    Year,
}

impl TimeUnit {
    fn parse(word: &str) -> Option<Self> {
        let singular = word.strip_suffix('s').unwrap_or(word);
        match singular {
            "second" => Some(Self::Second),
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn seconds(&self) -> i64 {
        const DAY: i64 = 86_400;
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => DAY,
            Self::Week => 7 * DAY,
            Self::Month => 30 * DAY,
            Self::Year => 365 * DAY,
        }
    }
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

/// A recognized relative time expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeExpression {
    Ago { amount: i64, unit: TimeUnit },
    Today,
    Yesterday,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    ThisYear,
    LastYear,
}

impl RelativeExpression {
    /// Parse an expression. Case and surrounding whitespace are ignored.
    pub fn parse(expression: &str) -> Option<Self> {
        let normalized = expression.trim().to_lowercase();
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        match tokens.as_slice() {
            ["today"] => Some(Self::Today),
            ["yesterday"] => Some(Self::Yesterday),
            ["this", "week"] => Some(Self::ThisWeek),
            ["last", "week"] => Some(Self::LastWeek),
            ["this", "month"] => Some(Self::ThisMonth),
            ["last", "month"] => Some(Self::LastMonth),
            ["this", "year"] => Some(Self::ThisYear),
            ["last", "year"] => Some(Self::LastYear),
            // Words after "ago" are ignored: "2 hours ago please".
            [amount, unit, "ago", ..] => Self::parse_ago(amount, unit),
            // "3days ago"
            [joined, "ago", ..] => {
                let split = joined
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(joined.len());
                let (amount, unit) = joined.split_at(split);
                Self::parse_ago(amount, unit)
            }
            _ => None,
        }
    }

    fn parse_ago(amount: &str, unit: &str) -> Option<Self> {
        if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let amount = amount.parse::<i64>().ok()?;
        let unit = TimeUnit::parse(unit)?;
        Some(Self::Ago { amount, unit })
    }

    /// Resolve against `now`. `None` only on arithmetic overflow.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<TimeRange> {
        let today = now.date_naive();
        let (start, end) = match *self {
            Self::Ago { amount, unit } => {
                let secs = amount.checked_mul(unit.seconds())?;
                let start = now.checked_sub_signed(Duration::try_seconds(secs)?)?;
                (start, now)
            }
            Self::Today => (start_of_day(today)?, now),
            Self::Yesterday => {
                let day = today.pred_opt()?;
                (start_of_day(day)?, end_of_day(day)?)
            }
            Self::ThisWeek => (start_of_day(monday_of(today)?)?, now),
            Self::LastWeek => {
                let last_monday = monday_of(today)?.checked_sub_signed(Duration::days(7))?;
                let last_sunday = last_monday.checked_add_signed(Duration::days(6))?;
                (start_of_day(last_monday)?, end_of_day(last_sunday)?)
            }
            Self::ThisMonth => (start_of_day(today.with_day(1)?)?, now),
            Self::LastMonth => {
                let last_of_prev = today.with_day(1)?.pred_opt()?;
                let first_of_prev = last_of_prev.with_day(1)?;
                (start_of_day(first_of_prev)?, end_of_day(last_of_prev)?)
            }
            Self::ThisYear => {
                let jan1 = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
                (start_of_day(jan1)?, now)
            }
            Self::LastYear => {
                let year = today.year() - 1;
                let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
                let dec31 = NaiveDate::from_ymd_opt(year, 12, 31)?;
                (start_of_day(jan1)?, end_of_day(dec31)?)
            }
        };
        TimeRange::new(start, end).ok()
    }
}

/// Resolve a relative time expression to an absolute UTC range.
///
/// Never fails: unrecognized input falls back to the trailing 24 hours.
pub fn parse_relative_time(expression: &str, now: DateTime<Utc>) -> TimeRange {
    match RelativeExpression::parse(expression).and_then(|expr| expr.resolve(now)) {
        Some(range) => range,
        None => {
            warn!(
                subsystem = "core",
                component = "temporal",
                expression = %expression,
                "Unrecognized time expression, defaulting to last 24 hours"
            );
            trailing_day(now)
        }
    }
}

fn trailing_day(now: DateTime<Utc>) -> TimeRange {
    TimeRange {
        start: now - Duration::days(1),
        end: now,
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_micro_opt(23, 59, 59, 999_999)?.and_utc())
}

fn monday_of(date: NaiveDate) -> Option<NaiveDate> {
    let offset = date.weekday().num_days_from_monday() as i64;
    date.checked_sub_signed(Duration::days(offset))
}

// =============================================================================
// TIME OF DAY
// =============================================================================

/// Time-of-day bucket used to narrow a resolved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    /// 06:00 to 11:59:59.999999
    Morning,
    /// 12:00 to 17:59:59.999999
    Afternoon,
    /// 18:00 to 21:59:59.999999
    Evening,
    /// 22:00 to 23:59:59.999999
    Night,
}

impl TimeOfDay {
    fn hours(&self) -> (u32, u32) {
        match self {
            Self::Morning => (6, 11),
            Self::Afternoon => (12, 17),
            Self::Evening => (18, 21),
            Self::Night => (22, 23),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    /// Bucket bounds on the given calendar day.
    pub fn bounds_on(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let (first, last) = self.hours();
        let start = date.and_hms_opt(first, 0, 0)?.and_utc();
        let end = date.and_hms_micro_opt(last, 59, 59, 999_999)?.and_utc();
        Some((start, end))
    }

    /// Narrow `range` to this bucket on its start day and end day.
    pub fn narrow(&self, range: TimeRange) -> TimeRange {
        let start = self.bounds_on(range.start.date_naive()).map(|(s, _)| s);
        let end = self.bounds_on(range.end.date_naive()).map(|(_, e)| e);
        match (start, end) {
            (Some(start), Some(end)) => TimeRange::new(start, end).unwrap_or(range),
            _ => range,
        }
    }
}

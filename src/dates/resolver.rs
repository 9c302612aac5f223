//! Date token parsing and resolution

use crate::error::{Error, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Source of "today" for token resolution
pub trait Clock: Send + Sync {
    /// The current calendar date
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a fixed date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Which end of a fetch window a token is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Lower bound (`executed_after`)
    After,
    /// Upper bound (`executed_before`)
    Before,
}

/// A symbolic or explicit date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    /// The day before today
    Yesterday,
    /// Start of last month as a lower bound, end of last month otherwise
    LastMonth,
    /// First day of the previous calendar month
    LastMonthStart,
    /// Last day of the previous calendar month
    LastMonthEnd,
    /// An explicit calendar date
    Date(NaiveDate),
}

impl FromStr for DateToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "yesterday" => Ok(Self::Yesterday),
            "last_month" => Ok(Self::LastMonth),
            "last_month_start" => Ok(Self::LastMonthStart),
            "last_month_end" => Ok(Self::LastMonthEnd),
            other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
                .map(Self::Date)
                .map_err(|_| Error::invalid_date(s)),
        }
    }
}

impl fmt::Display for DateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateToken::Yesterday => write!(f, "yesterday"),
            DateToken::LastMonth => write!(f, "last_month"),
            DateToken::LastMonthStart => write!(f, "last_month_start"),
            DateToken::LastMonthEnd => write!(f, "last_month_end"),
            DateToken::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl DateToken {
    /// Resolve to a calendar date relative to `today`
    pub fn to_date(self, today: NaiveDate, bound: Bound) -> NaiveDate {
        match self {
            DateToken::Yesterday => today - Duration::days(1),
            DateToken::LastMonthStart => first_day_of_last_month(today),
            DateToken::LastMonthEnd => last_day_of_last_month(today),
            DateToken::LastMonth => match bound {
                Bound::After => first_day_of_last_month(today),
                Bound::Before => last_day_of_last_month(today),
            },
            DateToken::Date(date) => date,
        }
    }

    /// Resolve to the start of the day relative to `today`
    pub fn resolve(self, today: NaiveDate, bound: Bound) -> NaiveDateTime {
        self.to_date(today, bound).and_time(NaiveTime::MIN)
    }
}

fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn last_day_of_last_month(today: NaiveDate) -> NaiveDate {
    first_day_of_month(today) - Duration::days(1)
}

fn first_day_of_last_month(today: NaiveDate) -> NaiveDate {
    first_day_of_month(last_day_of_last_month(today))
}

/// Format a resolved timestamp the way the helpdesk API expects it
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Resolved bounds of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Lower bound
    pub after: NaiveDateTime,
    /// Upper bound
    pub before: NaiveDateTime,
}

impl FetchWindow {
    /// Create a window from resolved bounds
    pub fn new(after: NaiveDateTime, before: NaiveDateTime) -> Self {
        Self { after, before }
    }

    /// Query parameters for the time entries endpoint
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("executed_after", format_timestamp(self.after)),
            ("executed_before", format_timestamp(self.before)),
        ]
    }
}

/// Resolves date tokens against a clock
#[derive(Clone)]
pub struct DateResolver {
    clock: Arc<dyn Clock>,
}

impl DateResolver {
    /// Create a resolver on the local wall clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create a resolver on a custom clock
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    /// Today's date according to the clock
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Resolve a token on its own (`last_month` means the last day of last month)
    pub fn resolve(&self, input: &str) -> Result<NaiveDateTime> {
        self.resolve_bound(input, Bound::Before)
    }

    /// Resolve a token as one end of a fetch window
    pub fn resolve_bound(&self, input: &str, bound: Bound) -> Result<NaiveDateTime> {
        let token: DateToken = input.parse()?;
        Ok(token.resolve(self.today(), bound))
    }

    /// Resolve both ends of a window; a missing bound means yesterday
    pub fn window(&self, after: Option<&str>, before: Option<&str>) -> Result<FetchWindow> {
        let after = after.filter(|s| !s.trim().is_empty()).unwrap_or("yesterday");
        let before = before.filter(|s| !s.trim().is_empty()).unwrap_or("yesterday");

        Ok(FetchWindow::new(
            self.resolve_bound(after, Bound::After)?,
            self.resolve_bound(before, Bound::Before)?,
        ))
    }

    /// `YYYYMM` suffix for default table names
    ///
    /// Uses the month of yesterday, or the previous month when a full
    /// last-month refresh is requested.
    pub fn table_suffix(&self, last_month: bool) -> String {
        let today = self.today();
        let date = if last_month {
            last_day_of_last_month(today)
        } else {
            DateToken::Yesterday.to_date(today, Bound::Before)
        };
        date.format("%Y%m").to_string()
    }
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateResolver")
            .field("today", &self.today())
            .finish()
    }
}

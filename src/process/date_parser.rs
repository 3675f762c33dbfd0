use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::ReviewError;
use crate::process::utils::clean_str;

/// Textual form every stored date takes.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// The date layouts seen in review exports, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `99-01-15 10:30:00`
    ShortYearDateTime,
    /// `15/01/99`
    DayMonthShortYear,
    /// `2005-06-01 00:00:00`
    LongYearDateTime,
}

impl DateFormat {
    pub const PRIORITY: [DateFormat; 3] = [
        DateFormat::ShortYearDateTime,
        DateFormat::DayMonthShortYear,
        DateFormat::LongYearDateTime,
    ];

    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::ShortYearDateTime => "%y-%m-%d %H:%M:%S",
            DateFormat::DayMonthShortYear => "%d/%m/%y",
            DateFormat::LongYearDateTime => "%Y-%m-%d %H:%M:%S",
        }
    }

    fn has_short_year(self) -> bool {
        !matches!(self, DateFormat::LongYearDateTime)
    }

    fn parse_raw(self, s: &str) -> Option<NaiveDate> {
        match self {
            DateFormat::DayMonthShortYear => NaiveDate::parse_from_str(s, self.pattern()).ok(),
            _ => NaiveDateTime::parse_from_str(s, self.pattern())
                .ok()
                .map(|dt| dt.date()),
        }
    }
}

/// Parses the review `date` column into a calendar day.
///
/// Two-digit years are resolved with an explicit pivot rather than whatever
/// the parser would pick: `yy < pivot` is 20yy, anything else 19yy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateNormalizer {
    century_pivot: u8,
}

impl DateNormalizer {
    pub fn new(century_pivot: u8) -> Self {
        Self { century_pivot }
    }

    /// Try every known format in priority order; first match wins.
    pub fn normalize(&self, raw: &str) -> Result<NaiveDate, ReviewError> {
        let s = clean_str(raw);
        DateFormat::PRIORITY
            .iter()
            .find_map(|fmt| self.parse_with(&s, *fmt))
            .ok_or_else(|| ReviewError::UnparseableDate {
                value: raw.to_string(),
            })
    }

    /// Parse `s` with a single format, applying the century pivot when the
    /// format only carries two year digits.
    pub fn parse_with(&self, s: &str, fmt: DateFormat) -> Option<NaiveDate> {
        let date = fmt.parse_raw(s)?;
        if !fmt.has_short_year() {
            return Some(date);
        }
        let year = self.resolve_short_year(date.year().rem_euclid(100));
        // Feb 29 may not exist in the resolved century.
        date.with_year(year)
    }

    pub fn resolve_short_year(&self, yy: i32) -> i32 {
        if yy < i32::from(self.century_pivot) {
            2000 + yy
        } else {
            1900 + yy
        }
    }
}

pub fn canonical_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

//! The date dimension — a fully populated calendar keyed by `date_id`.
//!
//! Every fact references a calendar row. Coverage must be contiguous: one
//! row per date, no gaps, each date mapping to exactly one identifier.

use chrono::{Datelike as _, NaiveDate};

/// The calendar identifier for a date: `yyyymmdd` as an integer.
/// Strictly monotonic in the date, so range scans over `date_id` are range
/// scans over time.
pub fn date_id(date: NaiveDate) -> i32 {
  date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// English month name, as stored in the `month_name` column.
pub fn month_name(month: u32) -> &'static str {
  match month {
    1 => "January",
    2 => "February",
    3 => "March",
    4 => "April",
    5 => "May",
    6 => "June",
    7 => "July",
    8 => "August",
    9 => "September",
    10 => "October",
    11 => "November",
    _ => "December",
  }
}

/// One row of the date dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
  pub date_id:    i32,
  pub date:       NaiveDate,
  pub day:        u32,
  pub month:      u32,
  pub month_name: &'static str,
  pub year:       i32,
}

impl CalendarDay {
  pub fn for_date(date: NaiveDate) -> Self {
    Self {
      date_id:    date_id(date),
      date,
      day:        date.day(),
      month:      date.month(),
      month_name: month_name(date.month()),
      year:       date.year(),
    }
  }
}

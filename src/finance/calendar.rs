use crate::error::{Result, VidaError};
use chrono::{Datelike, Months, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| VidaError::invalid("date", format!("`{raw}` is not YYYY-MM-DD ({e})")))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses `YYYY-MM` into (year, month).
pub fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let invalid = || VidaError::invalid("month", format!("`{raw}` is not YYYY-MM"));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

/// Day `day` of the month, pulled back to the month's last day when short.
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// First and last day of a `YYYY-MM` month.
pub fn month_bounds(raw: &str) -> Result<(NaiveDate, NaiveDate)> {
    let (year, month) = parse_month(raw)?;
    let first = clamped_date(year, month, 1);
    let last = clamped_date(year, month, 31);
    match (first, last) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(VidaError::invalid("month", format!("`{raw}` is out of range"))),
    }
}

/// `anchor` shifted by whole months. Always offset from the anchor so that a
/// schedule starting on the 31st returns to the 31st after a short month.
pub fn add_months_clamped(anchor: NaiveDate, months: u32) -> Option<NaiveDate> {
    anchor.checked_add_months(Months::new(months))
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

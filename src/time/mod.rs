use chrono::{NaiveDate, NaiveTime, TimeDelta};

mod week;
pub use week::*;

/// Format used for the time entries of the time block.
pub const TIME_FORMAT: &str = "%H:%M";
/// Format used for the first and last day of the week in the header.
pub const SHORT_DATE_FORMAT: &str = "%m/%d/%y";

#[must_use]
pub fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[must_use]
pub fn format_short_date(date: &NaiveDate) -> String {
    date.format(SHORT_DATE_FORMAT).to_string()
}

/// Formats a duration as total hours and minutes, e.g. `37:30`.
///
/// Hours are not wrapped at 24, negative durations are prefixed with `-`.
#[must_use]
pub fn format_total_hours(duration: &TimeDelta) -> String {
    let minutes = duration.num_minutes();
    let sign = if minutes < 0 { "-" } else { "" };
    let minutes = minutes.unsigned_abs();

    format!("{}{}:{:02}", sign, minutes / 60, minutes % 60)
}

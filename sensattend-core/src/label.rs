//! Human-readable labels for history entries, e.g. `14:05, 3rd Oct 2024`.

use std::fmt::Display;

use chrono::{DateTime, Datelike, TimeZone};

/// English ordinal suffix for a day of the month.
pub fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Format a timestamp as `HH:MM, <day><suffix> <Mon> <YYYY>` in its own zone.
///
/// Convert with [`DateTime::with_timezone`] first to render in another zone.
pub fn format_label<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let day = timestamp.day();
    format!(
        "{}, {}{} {}",
        timestamp.format("%H:%M"),
        day,
        ordinal_suffix(day),
        timestamp.format("%b %Y"),
    )
}

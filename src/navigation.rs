//! Calendar-day navigation for the custom date picker

use chrono::{Duration, NaiveDate};

use crate::error::{GlucoseError, Result};

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(Duration::days(1)).unwrap_or(date)
}

/// The following day, or `None` when `date` is already `today` or later
pub fn next_day(date: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    if date >= today {
        return None;
    }
    date.checked_add_signed(Duration::days(1))
}

/// Custom dates may not lie in the future
pub fn validate_custom_date(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate> {
    if date > today {
        return Err(GlucoseError::Validation(format!(
            "{} is in the future (today is {})",
            date, today
        )));
    }
    Ok(date)
}

/// Parse `YYYY-MM-DD` and validate it against `today`
pub fn parse_custom_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        GlucoseError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", input))
    })?;
    validate_custom_date(date, today)
}

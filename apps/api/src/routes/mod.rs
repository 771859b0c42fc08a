//! HTTP route handlers, one module per resource.

pub mod customers;
pub mod database;
pub mod health;
pub mod sales;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::ApiError;

/// Which end of a day a bare `YYYY-MM-DD` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DayBound {
    Start,
    End,
}

/// Parses an RFC 3339 timestamp or a bare UTC date.
///
/// A bare date covers the whole day: `Start` maps it to 00:00:00 and `End`
/// to 23:59:59.999.
pub(crate) fn parse_date(
    field: &str,
    value: &str,
    bound: DayBound,
) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ApiError::validation(format!(
            "{} must be an RFC 3339 timestamp or YYYY-MM-DD, got '{}'",
            field, value
        ))
    })?;
    let time = match bound {
        DayBound::Start => NaiveTime::MIN,
        DayBound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

/// Parses an optional date query parameter.
pub(crate) fn parse_optional_date(
    field: &str,
    value: Option<&str>,
    bound: DayBound,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v, bound).map(Some),
        None => Ok(None),
    }
}

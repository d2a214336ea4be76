//! Irrigation schedule validation and encoding.
//!
//! The operator enters a start instant as six raw text fields (year, month,
//! day, hour, minute, duration) plus a repeat flag. [`build_schedule`]
//! validates them in a fixed order and encodes the result as a
//! [`ScheduleRequest`] carrying an absolute `YYYY-MM-DDTHH:MM:00.000+07:00`
//! timestamp. The `+07:00` offset is a fixed constant, not derived from the
//! runtime's local timezone, so the same wall-clock input always denotes the
//! same absolute instant regardless of where the console runs.
//!
//! Validation order:
//!
//! 1. every calendar field non-empty ([`ScheduleError::MissingField`])
//! 2. every field parses as a finite number ([`ScheduleError::InvalidValue`])
//! 3. range checks: hour 0-23, minute 0-59, month 1-12, day 1-31
//!    ([`ScheduleError::OutOfRange`])
//!
//! Day-of-month is NOT validated against the month or leap years; day 31 of
//! February is accepted and left for the backend to reject. Duration is only
//! required to be numeric.
//!
//! The builder never submits; submission goes through the gateway separately
//! so a transport failure is reported distinctly from a validation failure.

use thiserror::Error;

use farmlink_types::ScheduleRequest;

/// Fixed UTC offset appended to every encoded schedule timestamp.
pub const SCHEDULE_UTC_OFFSET: &str = "+07:00";

/// One of the operator-entered schedule fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Duration,
}

impl ScheduleField {
    fn name(&self) -> &'static str {
        match self {
            ScheduleField::Year => "year",
            ScheduleField::Month => "month",
            ScheduleField::Day => "day",
            ScheduleField::Hour => "hour",
            ScheduleField::Minute => "minute",
            ScheduleField::Duration => "duration",
        }
    }
}

impl std::fmt::Display for ScheduleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validation failure for operator-entered schedule fields.
///
/// These are local failures; they block submission and never reach the
/// network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A required calendar field was left empty.
    #[error("missing field: {0}")]
    MissingField(ScheduleField),

    /// A field did not parse as a finite number.
    #[error("invalid value for field: {0}")]
    InvalidValue(ScheduleField),

    /// A parsed field fell outside its allowed range.
    #[error("field out of range: {0}")]
    OutOfRange(ScheduleField),
}

/// Raw operator input for one schedule submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleFields {
    pub hour: String,
    pub minute: String,
    pub day: String,
    pub month: String,
    pub year: String,
    pub duration_minutes: String,
    pub repeat_daily: bool,
}

/// Calendar fields checked for presence, in the order failures are reported.
const CALENDAR_FIELDS: [ScheduleField; 5] = [
    ScheduleField::Year,
    ScheduleField::Month,
    ScheduleField::Day,
    ScheduleField::Hour,
    ScheduleField::Minute,
];

fn raw(fields: &ScheduleFields, field: ScheduleField) -> &str {
    match field {
        ScheduleField::Year => &fields.year,
        ScheduleField::Month => &fields.month,
        ScheduleField::Day => &fields.day,
        ScheduleField::Hour => &fields.hour,
        ScheduleField::Minute => &fields.minute,
        ScheduleField::Duration => &fields.duration_minutes,
    }
}

fn parse_finite(fields: &ScheduleFields, field: ScheduleField) -> Result<f64, ScheduleError> {
    raw(fields, field)
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(ScheduleError::InvalidValue(field))
}

fn check_range(value: f64, min: f64, max: f64, field: ScheduleField) -> Result<(), ScheduleError> {
    if value < min || value > max {
        return Err(ScheduleError::OutOfRange(field));
    }
    Ok(())
}

/// Validate operator input and encode it into a [`ScheduleRequest`].
///
/// Missing-field checks run before parse checks, which run before range
/// checks, so `build_schedule` with an empty hour reports
/// [`ScheduleError::MissingField`] even if other fields are out of range.
pub fn build_schedule(fields: &ScheduleFields) -> Result<ScheduleRequest, ScheduleError> {
    for field in CALENDAR_FIELDS {
        if raw(fields, field).is_empty() {
            return Err(ScheduleError::MissingField(field));
        }
    }

    let year = parse_finite(fields, ScheduleField::Year)?;
    let month = parse_finite(fields, ScheduleField::Month)?;
    let day = parse_finite(fields, ScheduleField::Day)?;
    let hour = parse_finite(fields, ScheduleField::Hour)?;
    let minute = parse_finite(fields, ScheduleField::Minute)?;

    check_range(hour, 0.0, 23.0, ScheduleField::Hour)?;
    check_range(minute, 0.0, 59.0, ScheduleField::Minute)?;
    check_range(month, 1.0, 12.0, ScheduleField::Month)?;
    // No month-length or leap-year check; day 31 of any month passes.
    check_range(day, 1.0, 31.0, ScheduleField::Day)?;

    let duration_minutes = parse_finite(fields, ScheduleField::Duration)?;

    let start_time = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:00.000{}",
        year as i64, month as i64, day as i64, hour as i64, minute as i64, SCHEDULE_UTC_OFFSET,
    );

    Ok(ScheduleRequest {
        start_time,
        duration_minutes,
        repeat_daily: fields.repeat_daily,
    })
}

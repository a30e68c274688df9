//! CF-convention time decoding.
//!
//! Time coordinates in climate model output are stored as numeric offsets from a
//! reference date, described by a `units` attribute such as
//! `"days since 2000-01-01 00:00:00"`. Decoding is opt-in (see
//! [`crate::dataset::LoadOptions::decode_times`]) because model calendars like
//! `noleap` cannot be represented with the proleptic Gregorian calendar.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Parsed `<unit> since <reference>` string
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    /// Length of one unit in seconds
    pub seconds_per_unit: f64,
    pub reference: NaiveDateTime,
}

/// Calendars that map onto the proleptic Gregorian calendar
const GREGORIAN_CALENDARS: &[&str] = &["standard", "gregorian", "proleptic_gregorian"];

/// Parses a CF `units` string.
pub fn parse_time_units(units: &str) -> Result<TimeUnits, String> {
    let lower = units.trim().to_lowercase();
    let (unit, reference) = lower
        .split_once(" since ")
        .ok_or_else(|| format!("'{}' is not of the form '<unit> since <date>'", units))?;

    let seconds_per_unit = match unit.trim() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        other => return Err(format!("Unsupported time unit '{}'", other)),
    };

    let reference = parse_reference_date(reference.trim())
        .ok_or_else(|| format!("Unparseable reference date in '{}'", units))?;

    Ok(TimeUnits {
        seconds_per_unit,
        reference,
    })
}

fn parse_reference_date(s: &str) -> Option<NaiveDateTime> {
    // Drop a trailing timezone designator ("UTC", "Z", "+00:00"); only UTC is meaningful here
    let s = s
        .trim_end_matches(" utc")
        .trim_end_matches('z')
        .trim_end_matches("+00:00")
        .trim_end_matches(" +0:00")
        .trim();
    let s = s.replacen('t', " ", 1);

    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Decodes numeric offsets into calendar datetimes.
///
/// `calendar` is the coordinate's `calendar` attribute; `None` means standard.
pub fn decode_times(
    values: &[f64],
    units: &str,
    calendar: Option<&str>,
) -> Result<Vec<NaiveDateTime>, String> {
    if let Some(cal) = calendar {
        let cal = cal.trim().to_lowercase();
        if !GREGORIAN_CALENDARS.contains(&cal.as_str()) {
            return Err(format!("Unsupported calendar '{}'", cal));
        }
    }

    let parsed = parse_time_units(units)?;
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return Err(format!("Cannot decode non-finite time value {}", v));
            }
            let overflow = || format!("Time value {} overflows the calendar", v);
            let millis = (v * parsed.seconds_per_unit * 1000.0).round();
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            if !(millis >= i64::MIN as f64 && millis < i64::MAX as f64) {
                return Err(overflow());
            }
            Duration::try_milliseconds(millis as i64)
                .and_then(|offset| parsed.reference.checked_add_signed(offset))
                .ok_or_else(overflow)
        })
        .collect()
}

/// True when a `units` string looks like a CF time axis
pub fn is_time_units(units: &str) -> bool {
    units.to_lowercase().contains(" since ")
}

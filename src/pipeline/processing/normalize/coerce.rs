//! Cell-level conversions used by the type normalizer.
//!
//! Every function maps a null cell to `Ok(None)`. `Err` carries a short cause
//! that the caller wraps with the column name.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::RawValue;

type Coerced<T> = std::result::Result<Option<T>, String>;

const TRUE_WORDS: [&str; 6] = ["true", "t", "yes", "y", "on", "1"];
const FALSE_WORDS: [&str; 6] = ["false", "f", "no", "n", "off", "0"];

// Day-first layouts come before ISO so "05/01/2024" reads as 5 January.
const DATETIME_FORMATS: [&str; 11] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub fn to_float(value: &RawValue) -> Coerced<f64> {
    match value {
        RawValue::Null => Ok(None),
        RawValue::Number(n) => Ok(finite(*n)),
        RawValue::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        RawValue::Text(s) => match s.trim().parse::<f64>() {
            // "nan" and friends parse fine but mean missing
            Ok(n) => Ok(finite(n)),
            Err(_) => Err(format!("cannot parse '{s}' as float")),
        },
    }
}

pub fn to_bool(value: &RawValue) -> Coerced<bool> {
    match value {
        RawValue::Null => Ok(None),
        RawValue::Bool(b) => Ok(Some(*b)),
        RawValue::Number(n) => Ok(finite(*n).map(|n| n != 0.0)),
        RawValue::Text(s) => {
            let lower = s.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&lower.as_str()) {
                Ok(Some(true))
            } else if FALSE_WORDS.contains(&lower.as_str()) {
                Ok(Some(false))
            } else if let Ok(n) = lower.parse::<f64>() {
                Ok(finite(n).map(|n| n != 0.0))
            } else {
                Err(format!("cannot parse '{s}' as boolean"))
            }
        }
    }
}

pub fn to_category(value: &RawValue) -> Coerced<String> {
    Ok(value.as_text().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

/// `"80%"` and `"80"` both become `0.8`.
pub fn to_fraction(value: &RawValue) -> Coerced<f64> {
    match value {
        RawValue::Null => Ok(None),
        RawValue::Number(n) => Ok(finite(*n / 100.0)),
        RawValue::Bool(_) => Err("boolean is not a percentage".to_string()),
        RawValue::Text(s) => {
            let trimmed = s.trim();
            let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
            number
                .parse::<f64>()
                .map(|n| finite(n / 100.0))
                .map_err(|_| format!("cannot parse '{s}' as percentage"))
        }
    }
}

/// Split `"<lat>,<lon>"` into its two floats. A non-finite half such as
/// `nan` becomes null, like any other missing measurement.
pub fn to_coordinates(value: &RawValue) -> Coerced<(Option<f64>, Option<f64>)> {
    let text = match value {
        RawValue::Null => return Ok(None),
        RawValue::Text(s) => s,
        other => return Err(format!("expected '<lat>,<lon>', got {other:?}")),
    };
    let mut parts = text.split(',');
    let (lat, lon) = match (parts.next(), parts.next(), parts.next()) {
        (Some(lat), Some(lon), None) => (lat.trim(), lon.trim()),
        _ => return Err(format!("expected '<lat>,<lon>', got '{text}'")),
    };
    let lat: f64 = lat.parse().map_err(|_| format!("invalid latitude in '{text}'"))?;
    let lon: f64 = lon.parse().map_err(|_| format!("invalid longitude in '{text}'"))?;
    Ok(Some((finite(lat), finite(lon))))
}

/// Parse a device timestamp, reading ambiguous dates day-first.
/// Returns `None` for anything unparseable, including empty cells.
pub fn to_timestamp(value: &RawValue) -> Option<NaiveDateTime> {
    let RawValue::Text(raw) = value else {
        return None;
    };
    let s = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(s, fmt) {
            return day.and_hms_opt(0, 0, 0);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.to_string())
    }

    #[test]
    fn floats_accept_numbers_and_text() {
        assert_eq!(to_float(&text("3.5")), Ok(Some(3.5)));
        assert_eq!(to_float(&RawValue::Number(2.0)), Ok(Some(2.0)));
        assert_eq!(to_float(&text("NaN")), Ok(None));
        assert!(to_float(&text("abc")).is_err());
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(to_bool(&text("True")), Ok(Some(true)));
        assert_eq!(to_bool(&text("no")), Ok(Some(false)));
        assert_eq!(to_bool(&text("0")), Ok(Some(false)));
        assert_eq!(to_bool(&text("1.0")), Ok(Some(true)));
        assert_eq!(to_bool(&RawValue::Null), Ok(None));
        assert!(to_bool(&text("maybe")).is_err());
    }

    #[test]
    fn percentages_become_fractions() {
        assert_eq!(to_fraction(&text("80%")), Ok(Some(0.8)));
        assert_eq!(to_fraction(&text(" 25 % ")), Ok(Some(0.25)));
        assert_eq!(to_fraction(&RawValue::Number(50.0)), Ok(Some(0.5)));
        assert!(to_fraction(&text("high")).is_err());
    }

    #[test]
    fn coordinates_split_into_lat_lon() {
        assert_eq!(to_coordinates(&text("12.5,-3.25")), Ok(Some((Some(12.5), Some(-3.25)))));
        assert_eq!(to_coordinates(&text(" 6.5 , 3.4 ")), Ok(Some((Some(6.5), Some(3.4)))));
        assert!(to_coordinates(&text("12.5")).is_err());
        assert!(to_coordinates(&text("1,2,3")).is_err());
        assert_eq!(to_coordinates(&RawValue::Null), Ok(None));
    }

    #[test]
    fn non_finite_coordinates_are_null() {
        assert_eq!(to_coordinates(&text("nan,nan")), Ok(Some((None, None))));
        assert_eq!(to_coordinates(&text("inf,2.5")), Ok(Some((None, Some(2.5)))));
    }

    #[test]
    fn timestamps_are_day_first() {
        let ts = to_timestamp(&text("05/01/2024 08:30")).unwrap();
        assert_eq!(ts.to_string(), "2024-01-05 08:30:00");
        let iso = to_timestamp(&text("2024-01-05 08:30:15")).unwrap();
        assert_eq!(iso.to_string(), "2024-01-05 08:30:15");
        let day_only = to_timestamp(&text("31-12-2023")).unwrap();
        assert_eq!(day_only.to_string(), "2023-12-31 00:00:00");
    }

    #[test]
    fn bad_timestamps_are_none() {
        assert!(to_timestamp(&text("31/02/2024 10:00")).is_none());
        assert!(to_timestamp(&text("yesterday")).is_none());
        assert!(to_timestamp(&RawValue::Null).is_none());
    }
}

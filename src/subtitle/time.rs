//! Fixed-point timestamp conversion shared by the format codecs.
//!
//! Internally every timestamp is `f64` seconds. Each format stores a whole
//! number of its smallest unit; conversion rounds to the nearest unit so that
//! repeated parse/generate cycles do not drift.

pub const MILLIS_PER_SECOND: f64 = 1000.0;
pub const CENTIS_PER_SECOND: f64 = 100.0;

/// Round seconds to a whole number of `units_per_second` units.
pub fn to_units(seconds: f64, units_per_second: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * units_per_second).round() as u64
}

pub fn from_units(units: u64, units_per_second: f64) -> f64 {
    units as f64 / units_per_second
}

/// Seconds from clock components; `fraction` is expressed in `units_per_second`.
///
/// Summing whole units first keeps the result identical to the decimal
/// literal, e.g. `00:59:59,999` is exactly `3599.999`.
pub fn from_clock(hours: u64, minutes: u64, seconds: u64, fraction: u64, units_per_second: f64) -> f64 {
    let whole_seconds = hours * 3600 + minutes * 60 + seconds;
    let units = whole_seconds * units_per_second as u64 + fraction;
    from_units(units, units_per_second)
}

/// `HH:MM:SS<sep>mmm`, used by SRT (`,`) and VTT (`.`).
pub fn format_millis_clock(seconds: f64, separator: char) -> String {
    let total = to_units(seconds, MILLIS_PER_SECOND);
    format_millis_units(total, separator)
}

pub fn format_millis_units(total: u64, separator: char) -> String {
    let hours = total / 3_600_000;
    let minutes = (total % 3_600_000) / 60_000;
    let secs = (total % 60_000) / 1_000;
    let millis = total % 1_000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, millis)
}

/// `H:MM:SS.cc`, used by ASS.
pub fn format_centis_units(total: u64) -> String {
    let hours = total / 360_000;
    let minutes = (total % 360_000) / 6_000;
    let secs = (total % 6_000) / 100;
    let centis = total % 100;

    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
}

/// Rounded `(start, end)` in units with `end` forced past `start`.
///
/// A span that collapses under rounding is widened to one unit instead of
/// being emitted with `end <= start`.
pub fn rounded_span(start: f64, end: f64, units_per_second: f64) -> (u64, u64) {
    let start_units = to_units(start, units_per_second);
    let end_units = to_units(end, units_per_second);
    if end_units <= start_units {
        (start_units, start_units + 1)
    } else {
        (start_units, end_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis_clock() {
        assert_eq!(format_millis_clock(0.0, ','), "00:00:00,000");
        assert_eq!(format_millis_clock(65.123, ','), "00:01:05,123");
        assert_eq!(format_millis_clock(3661.5, '.'), "01:01:01.500");
    }

    #[test]
    fn test_rounding_is_nearest_not_truncating() {
        // 1.9996s truncates to 1.999 but rounds to 2.000
        assert_eq!(format_millis_clock(1.9996, ','), "00:00:02,000");
        // 0.1 + 0.2 is 0.30000000000000004 and 2.675 is stored as 2.67499999...
        assert_eq!(to_units(0.1 + 0.2, MILLIS_PER_SECOND), 300);
        assert_eq!(to_units(2.675, CENTIS_PER_SECOND), 267);
        assert_eq!(to_units(1.005, MILLIS_PER_SECOND), 1005);
    }

    #[test]
    fn test_format_centis_units() {
        assert_eq!(format_centis_units(to_units(1.0, CENTIS_PER_SECOND)), "0:00:01.00");
        assert_eq!(format_centis_units(to_units(3725.456, CENTIS_PER_SECOND)), "1:02:05.46");
    }

    #[test]
    fn test_negative_and_nan_clamp_to_zero() {
        assert_eq!(to_units(-3.0, MILLIS_PER_SECOND), 0);
        assert_eq!(to_units(f64::NAN, MILLIS_PER_SECOND), 0);
    }

    #[test]
    fn test_rounded_span_never_collapses() {
        assert_eq!(rounded_span(1.0, 1.0004, MILLIS_PER_SECOND), (1000, 1001));
        assert_eq!(rounded_span(2.0, 1.0, CENTIS_PER_SECOND), (200, 201));
        assert_eq!(rounded_span(1.0, 3.0, MILLIS_PER_SECOND), (1000, 3000));
    }

    #[test]
    fn test_from_clock() {
        assert_eq!(from_clock(1, 1, 1, 500, MILLIS_PER_SECOND), 3661.5);
        assert_eq!(from_clock(0, 0, 5, 25, CENTIS_PER_SECOND), 5.25);
    }
}

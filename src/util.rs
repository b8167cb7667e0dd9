// Utility helpers for parsing, rounding and number formatting.
//
// Cell-level cleanup lives here so the pipeline stages can assume typed
// values.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues common in spreadsheet exports (commas, spaces, text).
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(",", "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a day-first date such as `28-08-2028`, `28/08/2028` or
/// `28.08.2028`, optionally followed by a `00:00:00` time part.
pub fn parse_day_first_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split_whitespace().next()?;
    ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Round to the nearest integer, halves away from zero (`2.5 -> 3`, `-2.5 -> -3`).
pub fn round_to_int(v: f64) -> i64 {
    v.round() as i64
}

/// Arithmetic mean; `None` for an empty slice rather than a made-up zero.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_f64_safe_handles_dirty_input() {
        assert_eq!(parse_f64_safe(Some(" 1,250.5 ")), Some(1250.5));
        assert_eq!(parse_f64_safe(Some("N/A")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
        assert_eq!(parse_f64_safe(Some("12..3")), None);
    }

    #[test]
    fn day_first_dates() {
        let want = NaiveDate::from_ymd_opt(2028, 8, 28).unwrap();
        assert_eq!(parse_day_first_date("28-08-2028"), Some(want));
        assert_eq!(parse_day_first_date("28/08/2028"), Some(want));
        assert_eq!(parse_day_first_date("28.08.2028 00:00:00"), Some(want));
        // month-first reading would be month 28
        assert_eq!(parse_day_first_date("08-28-2028"), None);
        assert_eq!(parse_day_first_date("soon"), None);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to_int(449.5), 450);
        assert_eq!(round_to_int(450.5), 451);
        assert_eq!(round_to_int(133.333), 133);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[100.0, 200.0]), Some(150.0));
    }

    #[test]
    fn int_formatting() {
        assert_eq!(format_int(9855), "9,855");
        assert_eq!(format_int(-1234567i64), "-1,234,567");
    }
}

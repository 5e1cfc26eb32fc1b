/// Shared utility functions for the BCV statistics pipeline
use chrono::{DateTime, Utc};

/// Parse a number written in the Venezuelan locale
///
/// The BCV site uses a period as thousands separator and a comma as decimal
/// separator. Thousands separators are stripped first, then the decimal comma
/// becomes a decimal point.
///
/// # Examples
///
/// ```
/// use bcv_stats::utils::parse_locale_number;
///
/// assert_eq!(parse_locale_number("36.750,25"), Some(36750.25));
/// assert_eq!(parse_locale_number("36,5"), Some(36.5));
/// assert_eq!(parse_locale_number("1.234.567"), Some(1234567.0));
/// assert_eq!(parse_locale_number("n/d"), None);
/// ```
pub fn parse_locale_number(value: &str) -> Option<f64> {
    let normalized = value.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a UTC instant as ISO-8601 with microseconds and a `Z` suffix
pub fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Current UTC time formatted with [`format_utc`]
pub fn utc_timestamp() -> String {
    format_utc(Utc::now())
}

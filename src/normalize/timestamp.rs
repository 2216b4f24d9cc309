use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Formats tried when a configuration does not name its own
///
/// The first matches the JavaScript `Date.toString()` rendering used as a
/// tooltip by several forums (`Mon Jan 15 2024 10:30:00 GMT+0000`); the second
/// is RFC 3339 as found in `datetime` attributes.
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &["%a %b %d %Y %H:%M:%S GMT%z", "%+"];

/// Trailing parenthesized gloss such as "(Coordinated Universal Time)"
static ANNOTATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("annotation pattern"));

/// Parses a site-specific timestamp into ISO-8601
///
/// Strips a trailing parenthesized annotation, then tries each format in order.
/// Formats with an offset (`%z`, `%:z`, `%+`) keep the offset of the input;
/// formats without one are read as UTC.
///
/// # Arguments
///
/// * `text` - The raw timestamp as read from the page
/// * `formats` - chrono `strftime` patterns, tried in order
///
/// # Returns
///
/// The first successful parse rendered as RFC 3339, or `None` when every
/// format fails. Failure is not an error; callers decide what a missing
/// normalized timestamp means.
///
/// # Examples
///
/// ```
/// use thread_sift::normalize::{parse_timestamp, DEFAULT_TIMESTAMP_FORMATS};
///
/// let iso = parse_timestamp(
///     "Mon Jan 15 2024 10:30:00 GMT+0200 (Eastern European Standard Time)",
///     DEFAULT_TIMESTAMP_FORMATS,
/// );
/// assert_eq!(iso.as_deref(), Some("2024-01-15T10:30:00+02:00"));
/// ```
pub fn parse_timestamp<S: AsRef<str>>(text: &str, formats: &[S]) -> Option<String> {
    let cleaned = ANNOTATION_RE.replace(text.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    formats.iter().find_map(|format| {
        let format = format.as_ref();
        DateTime::parse_from_str(cleaned, format)
            .map(|dt| dt.to_rfc3339())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(cleaned, format).map(|dt| dt.and_utc().to_rfc3339())
            })
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_date_string_with_gloss() {
        let iso = parse_timestamp(
            "Mon Jan 15 2024 10:30:00 GMT+0000 (Coordinated Universal Time)",
            DEFAULT_TIMESTAMP_FORMATS,
        );
        assert_eq!(iso.as_deref(), Some("2024-01-15T10:30:00+00:00"));
    }

    #[test]
    fn test_offset_preserved() {
        let iso = parse_timestamp("Fri Mar 01 2024 23:05:09 GMT-0500", DEFAULT_TIMESTAMP_FORMATS);
        assert_eq!(iso.as_deref(), Some("2024-03-01T23:05:09-05:00"));
    }

    #[test]
    fn test_rfc3339_attribute() {
        let iso = parse_timestamp("2023-11-02T08:00:00+01:00", DEFAULT_TIMESTAMP_FORMATS);
        assert_eq!(iso.as_deref(), Some("2023-11-02T08:00:00+01:00"));
    }

    #[test]
    fn test_naive_format_read_as_utc() {
        let iso = parse_timestamp("2024-02-29 12:00:00", &["%Y-%m-%d %H:%M:%S"]);
        assert_eq!(iso.as_deref(), Some("2024-02-29T12:00:00+00:00"));
    }

    #[test]
    fn test_formats_tried_in_order() {
        let formats = ["%d/%m/%Y %H:%M", "%m/%d/%Y %H:%M"];
        let iso = parse_timestamp("03/04/2024 10:00", &formats);
        assert_eq!(iso.as_deref(), Some("2024-04-03T10:00:00+00:00"));
    }

    #[test]
    fn test_unmatched_is_none() {
        assert_eq!(parse_timestamp("2 hours ago", DEFAULT_TIMESTAMP_FORMATS), None);
        assert_eq!(parse_timestamp("", DEFAULT_TIMESTAMP_FORMATS), None);
        assert_eq!(parse_timestamp("(only a gloss)", DEFAULT_TIMESTAMP_FORMATS), None);
    }

    #[test]
    fn test_no_formats_is_none() {
        let formats: [&str; 0] = [];
        assert_eq!(parse_timestamp("2023-11-02T08:00:00+01:00", &formats), None);
    }
}

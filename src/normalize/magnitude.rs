use once_cell::sync::Lazy;
use regex::Regex;

/// First numeric token, optional decimal part, optional magnitude suffix
static MAGNITUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*)(?:\.(\d+))?(?:\s*([kmbt])\b)?").expect("magnitude pattern")
});

/// Fraction digits beyond this cannot contribute at the largest scale
const MAX_FRACTION_DIGITS: usize = 12;

/// Parses a human-readable magnitude string into an integer
///
/// Extracts the first numeric token (thousands separators allowed, optional
/// decimal part) and an optional case-insensitive suffix `K`, `M`, `B` or `T`.
/// Without a suffix the decimal part is truncated. Scaling uses integer
/// arithmetic, so `"1.2K"` is exactly 1200.
///
/// A string without any digit yields 0: counts that cannot be read are treated
/// as zero rather than failing the record.
///
/// # Examples
///
/// ```
/// use thread_sift::parse_magnitude;
///
/// assert_eq!(parse_magnitude("1,234"), 1234);
/// assert_eq!(parse_magnitude("1.2K"), 1200);
/// assert_eq!(parse_magnitude("3M Reposts"), 3_000_000);
/// assert_eq!(parse_magnitude("no digits here"), 0);
/// ```
pub fn parse_magnitude(text: &str) -> u64 {
    let Some(caps) = MAGNITUDE_RE.captures(text) else {
        return 0;
    };

    let integer: u128 = caps
        .get(1)
        .map(|m| m.as_str().replace(',', ""))
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0);

    let scale: u128 = match caps
        .get(3)
        .map(|m| m.as_str().to_ascii_lowercase())
        .as_deref()
    {
        Some("k") => 1_000,
        Some("m") => 1_000_000,
        Some("b") => 1_000_000_000,
        Some("t") => 1_000_000_000_000,
        _ => 1,
    };

    let fraction = match caps.get(2) {
        Some(m) if scale > 1 => {
            let digits = &m.as_str()[..m.as_str().len().min(MAX_FRACTION_DIGITS)];
            let value: u128 = digits.parse().unwrap_or(0);
            value * scale / 10u128.pow(digits.len() as u32)
        }
        _ => 0,
    };

    let total = integer.saturating_mul(scale).saturating_add(fraction);
    u64::try_from(total).unwrap_or(u64::MAX)
}

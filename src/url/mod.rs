//! URL handling for candidate item links
//!
//! Candidate URLs read from listing pages are canonicalized before they enter the
//! seen-set, so the same item reached through different spellings is only
//! extracted once. Host allow-lists use `*.example.com` wildcards.

mod matcher;
mod normalize;

pub use matcher::{host_allowed, matches_wildcard};
pub use normalize::canonicalize_url;

use crate::UrlError;
use url::Url;

/// Turns a raw attribute value found on a listing page into an absolute URL string
///
/// If `template` is given, `{value}` in it is replaced with the trimmed value
/// (used when the listing exposes bare identifiers instead of links). Otherwise
/// the value is resolved relative to the listing page URL.
///
/// # Arguments
///
/// * `listing_url` - The URL of the listing page the value was read from
/// * `raw` - The attribute value
/// * `template` - Optional URL template with a `{value}` placeholder
///
/// # Returns
///
/// The absolute, not yet canonicalized, URL
pub fn resolve_candidate(
    listing_url: &str,
    raw: &str,
    template: Option<&str>,
) -> Result<String, UrlError> {
    let value: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if value.is_empty() {
        return Err(UrlError::Malformed("empty link value".to_string()));
    }

    if let Some(template) = template {
        return Ok(template.replace("{value}", &value));
    }

    let base = Url::parse(listing_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    base.join(&value)
        .map(|u| u.to_string())
        .map_err(|e| UrlError::Parse(e.to_string()))
}

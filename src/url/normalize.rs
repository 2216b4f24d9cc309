use crate::UrlError;
use url::Url;

/// Query parameters that only carry referral/tracking data
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "ref_src"];

/// Canonicalizes a candidate item URL
///
/// The canonical form is what goes into the seen-set and what a record's
/// identifier is derived from, so it has to be stable across spellings of the
/// same link while never changing which resource is addressed.
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Lowercase the host
/// 4. Remove the fragment
/// 5. Remove tracking query parameters (`utm_*` and known referral keys)
/// 6. Sort the remaining query parameters; drop an empty query
///
/// The path (including any trailing slash) is kept as served: several archives
/// distinguish `/thread/42/` from `/thread/42`.
///
/// # Arguments
///
/// * `raw` - The absolute URL string
///
/// # Returns
///
/// * `Ok(String)` - The canonical URL
/// * `Err(UrlError)` - The URL could not be parsed or uses another scheme
///
/// # Examples
///
/// ```
/// use thread_sift::url::canonicalize_url;
///
/// let url = canonicalize_url("https://GAB.com/alice/posts/123456?utm_source=x#top").unwrap();
/// assert_eq!(url, "https://gab.com/alice/posts/123456");
/// ```
pub fn canonicalize_url(raw: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

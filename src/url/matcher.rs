use url::Url;

/// Checks if a host matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain at any depth. Both sides are compared
/// case-insensitively.
///
/// # Examples
///
/// ```
/// use thread_sift::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.4plebs.org", "archive.4plebs.org"));
/// assert!(matches_wildcard("gab.com", "GAB.com"));
/// assert!(!matches_wildcard("*.4plebs.org", "4plebs.org.evil.net"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|head| head.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// Returns true if the URL's host is covered by the allow-list
///
/// An empty allow-list admits every host.
pub fn host_allowed(url: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) else {
        return false;
    };

    allowed.iter().any(|pattern| matches_wildcard(pattern, &host))
}

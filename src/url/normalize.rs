use crate::UrlError;
use url::Url;

/// Scheme assumed when a URL arrives without one
const DEFAULT_SCHEME: &str = "http://";

/// Normalizes a URL for fetching
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Prefix `http://` when the URL carries no scheme
/// 3. Parse the URL; reject if malformed
/// 4. Reject anything but HTTP and HTTPS
/// 5. Require a host
///
/// Query strings are left untouched: request URLs double as dedup keys, so
/// the parameters a platform sees must be exactly the ones that were built.
///
/// # Examples
///
/// ```
/// use corpus_ripple::url::normalize_url;
///
/// let url = normalize_url("example.com/wp-json/wp/v2").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/wp-json/wp/v2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Malformed("empty URL".to_string()));
    }

    let with_scheme = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, trimmed.trim_start_matches('/'))
    };

    let url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Returns true if the string starts with `<scheme>://`
fn has_scheme(url: &str) -> bool {
    match url.find("://") {
        Some(idx) => {
            let scheme = &url[..idx];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}

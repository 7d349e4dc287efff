/// Trims a site URL down to a base suitable for appending API paths
///
/// Surrounding whitespace, trailing slashes and a dangling `?` are removed.
///
/// ```
/// use corpus_ripple::url::base_url;
///
/// assert_eq!(base_url(" https://example.com/news/? "), "https://example.com/news");
/// ```
pub fn base_url(site: &str) -> String {
    site.trim()
        .trim_end_matches(|c| c == '/' || c == '?')
        .to_string()
}

/// Strips the scheme from a site URL, keeping host and path
///
/// Web-search APIs restrict results by site prefix, which they expect
/// without a scheme.
///
/// ```
/// use corpus_ripple::url::site_prefix;
///
/// assert_eq!(site_prefix("https://www.example.com/news/"), "www.example.com/news");
/// assert_eq!(site_prefix("example.com"), "example.com");
/// ```
pub fn site_prefix(site: &str) -> String {
    let base = base_url(site);
    match base.find("://") {
        Some(idx) => base[idx + 3..].to_string(),
        None => base,
    }
}

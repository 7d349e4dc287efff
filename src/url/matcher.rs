/// Checks a URL against a substring stoplist
///
/// Returns the first stopword found in `url`, if any. Matching is a plain,
/// case-sensitive substring test, so `/author/` catches every author archive
/// and `.pdf` every PDF link.
///
/// # Examples
///
/// ```
/// use corpus_ripple::url::matching_stopword;
///
/// let stopwords = vec!["/author/".to_string(), ".pdf".to_string()];
/// assert_eq!(
///     matching_stopword("https://example.com/author/jane", &stopwords),
///     Some("/author/")
/// );
/// assert_eq!(matching_stopword("https://example.com/story", &stopwords), None);
/// ```
pub fn matching_stopword<'a>(url: &str, stopwords: &'a [String]) -> Option<&'a str> {
    stopwords
        .iter()
        .map(String::as_str)
        .find(|word| !word.is_empty() && url.contains(word))
}

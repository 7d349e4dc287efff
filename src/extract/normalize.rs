use regex::Regex;
use std::sync::LazyLock;

/// Leftover markup and bare URLs, stripped in one pass
static MARKUP_OR_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>|http\S*").expect("static regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Normalizes extracted text
///
/// In order: decode HTML entities, transliterate to ASCII, strip leftover
/// tags and `http...` tokens, collapse whitespace and trim, then rejoin
/// detached periods (`" ."` becomes `"."`).
///
/// ```
/// use corpus_ripple::extract::normalize_text;
///
/// assert_eq!(
///     normalize_text("Caf&eacute; &lt;b&gt;news&lt;/b&gt; at http://example.com  today ."),
///     "Cafe news at today."
/// );
/// ```
pub fn normalize_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let ascii = deunicode::deunicode(&decoded);
    let stripped = MARKUP_OR_URL.replace_all(&ascii, " ");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    collapsed.trim().replace(" .", ".")
}

/// Cleans a rendered title for storage
///
/// Platform titles often arrive as HTML fragments with entities.
pub fn clean_title(rendered: &str) -> String {
    normalize_text(rendered)
}

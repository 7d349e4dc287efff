use crate::config::ExtractorConfig;
use crate::extract::normalize::normalize_text;
use scraper::{Html, Selector};

/// Elements whose subtrees never contribute content
pub const PRUNED_TAGS: &[&str] = &[
    "head", "script", "style", "noscript", "nav", "header", "footer", "aside", "img", "figcaption",
    "caption",
];

const STUB_LENGTH: usize = 75;

/// Text recovered from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Cleaned plain text
    pub text: String,

    /// Candidate tag the text came from
    pub tag: String,
}

/// Extracts clean text from an HTML document
///
/// Candidate tags from `config.tags` are tried in order. For each, the text
/// of every element longer than `config.min_length` characters is joined
/// with spaces and normalized. The first tag that yields non-empty text is
/// returned; later tags are not consulted.
///
/// # Arguments
///
/// * `html` - The raw HTML document or fragment
/// * `config` - Length threshold and ordered candidate tags
///
/// # Returns
///
/// * `Some(Extracted)` - Text and the tag it came from
/// * `None` - No candidate tag produced content
pub fn extract(html: &str, config: &ExtractorConfig) -> Option<Extracted> {
    if html.trim().is_empty() {
        return None;
    }

    let mut document = Html::parse_document(html);
    prune(&mut document);

    for tag in &config.tags {
        let Ok(selector) = Selector::parse(tag) else {
            tracing::warn!("Skipping invalid candidate tag '{}'", tag);
            continue;
        };

        let joined = document
            .select(&selector)
            .map(|element| element.text().collect::<String>())
            .filter(|text| text.chars().count() > config.min_length)
            .collect::<Vec<_>>()
            .join(" ");

        let text = normalize_text(&joined);
        if !text.is_empty() {
            return Some(Extracted {
                text,
                tag: tag.clone(),
            });
        }
    }

    None
}

/// Extracts clean text, or an empty string if nothing was found
///
/// An empty result is a valid outcome, logged as a warning.
///
/// # Example
///
/// ```
/// use corpus_ripple::config::ExtractorConfig;
/// use corpus_ripple::extract_content;
///
/// let body = "word ".repeat(20);
/// let html = format!("<nav><p>{}</p></nav><p>{}</p>", "menu ".repeat(20), body);
/// assert_eq!(extract_content(&html, &ExtractorConfig::default()), body.trim());
/// ```
pub fn extract_content(html: &str, config: &ExtractorConfig) -> String {
    match extract(html, config) {
        Some(extracted) => {
            tracing::debug!("Extracted content from <{}>: {}", extracted.tag, stub(html));
            extracted.text
        }
        None => {
            tracing::warn!("No content found in HTML: {}", stub(html));
            String::new()
        }
    }
}

/// Extracts the page title from the document's `<title>` element
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| normalize_text(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Returns a short single-line preview of a string, for logs
pub fn stub(s: &str) -> String {
    let flat: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= STUB_LENGTH {
        flat
    } else {
        let head: String = flat.chars().take(STUB_LENGTH).collect();
        format!("{}...", head)
    }
}

/// Detaches every pruned subtree from the document
fn prune(document: &mut Html) {
    for tag in PRUNED_TAGS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };

        let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

use crate::model::{dates, Platform};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One collected document
///
/// Immutable once persisted. Its `url` is unique within its Query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub name: String,
    pub url: String,
    pub title: String,

    #[serde(with = "dates::date")]
    pub pub_date: NaiveDate,

    /// Raw HTML the text was extracted from
    pub content_html: String,

    /// Cleaned plain text
    pub content: String,

    /// Word count of `content`
    pub length: usize,

    /// Whether the search term literally appears in `content`
    pub exact_match: bool,

    pub query: String,
    pub source: String,

    /// Name of the Response this article was found in
    pub response: String,

    pub platform: Platform,

    #[serde(with = "dates::datetime")]
    pub collected_at: DateTime<Utc>,
}

impl Article {
    /// Base for allocating Article names under `query`
    ///
    /// Documents without a literal term match carry a `_no-exact-match`
    /// marker so they can be told apart by name alone.
    pub fn name_base(query: &str, exact_match: bool) -> String {
        if exact_match {
            query.to_string()
        } else {
            format!("{}_no-exact-match", query)
        }
    }
}

/// Counts whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Returns true if `term` appears literally in `content`
pub fn contains_term(content: &str, term: &str) -> bool {
    let term = term.trim();
    !term.is_empty() && content.contains(term)
}

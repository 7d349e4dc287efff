use crate::config::SourceEntry;
use crate::model::dates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A site to query
///
/// `name` is the only external identity. After import a Source changes only
/// through capability-probe results (`wordpress_endpoint`, `probed_at`) and
/// through its growing set of Query back-references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub title: String,

    /// Base site URL
    pub webpage: String,

    /// WordPress REST root, empty if the site has no usable search endpoint
    #[serde(default)]
    pub wordpress_endpoint: String,

    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Names of Queries scoped to this source
    #[serde(default)]
    pub queries: BTreeSet<String>,

    /// When the capability probe last ran
    #[serde(default, with = "dates::option_datetime")]
    pub probed_at: Option<DateTime<Utc>>,
}

impl Source {
    /// Builds a new Source from its configuration entry
    pub fn from_entry(entry: &SourceEntry) -> Self {
        Self {
            name: entry.name.clone(),
            title: entry.title.clone().unwrap_or_else(|| entry.name.clone()),
            webpage: entry.webpage.clone(),
            wordpress_endpoint: entry.wordpress_endpoint.clone(),
            language: entry.language.clone(),
            country: entry.country.clone(),
            copyright: entry.copyright.clone(),
            tags: entry.tags.iter().cloned().collect(),
            queries: BTreeSet::new(),
            probed_at: None,
        }
    }

    /// Returns true if the source exposes the WordPress search endpoint
    pub fn is_wordpress_capable(&self) -> bool {
        !self.wordpress_endpoint.is_empty()
    }

    /// Returns true if neither config nor a probe has settled capability yet
    pub fn needs_probe(&self) -> bool {
        self.probed_at.is_none() && self.wordpress_endpoint.is_empty()
    }

    /// Records a capability-probe outcome
    pub fn record_probe(&mut self, endpoint: Option<String>, at: DateTime<Utc>) {
        self.wordpress_endpoint = endpoint.unwrap_or_default();
        self.probed_at = Some(at);
    }

    /// Adds a Query back-reference, returning true if it was new
    pub fn add_query(&mut self, query_name: &str) -> bool {
        self.queries.insert(query_name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SourceEntry {
        SourceEntry {
            name: "example".to_string(),
            title: None,
            webpage: "https://example.com".to_string(),
            wordpress_endpoint: String::new(),
            language: "en-US".to_string(),
            country: "US".to_string(),
            copyright: "(c) Example".to_string(),
            tags: vec!["news".to_string(), "blog".to_string(), "news".to_string()],
        }
    }

    #[test]
    fn test_from_entry_defaults_title() {
        let source = Source::from_entry(&entry());
        assert_eq!(source.title, "example");
        assert_eq!(source.tags.len(), 2);
        assert!(!source.is_wordpress_capable());
        assert!(source.needs_probe());
    }

    #[test]
    fn test_record_probe() {
        let mut source = Source::from_entry(&entry());
        let now = Utc::now();

        source.record_probe(Some("https://example.com/wp-json/wp/v2".to_string()), now);
        assert!(source.is_wordpress_capable());
        assert!(!source.needs_probe());

        source.record_probe(None, now);
        assert!(!source.is_wordpress_capable());
        assert!(!source.needs_probe());
    }

    #[test]
    fn test_query_backrefs_grow() {
        let mut source = Source::from_entry(&entry());
        assert!(source.add_query("q1"));
        assert!(!source.add_query("q1"));
        assert!(source.add_query("q0"));
        let names: Vec<_> = source.queries.iter().cloned().collect();
        assert_eq!(names, vec!["q0", "q1"]);
    }

    #[test]
    fn test_serializes_sets_as_ordered_lists() {
        let mut source = Source::from_entry(&entry());
        source.add_query("b");
        source.add_query("a");
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["queries"], serde_json::json!(["a", "b"]));
        assert_eq!(json["tags"], serde_json::json!(["blog", "news"]));
        assert!(json["probed_at"].is_null());
    }
}

use crate::model::dates;
use crate::ConfigError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A search term over a date range, scoped to a Source
///
/// The name is derived as `source_term_startDate_endDate`, so the same query
/// always maps to the same record. That name is the resumption key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    pub source: String,
    pub term: String,

    #[serde(with = "dates::date")]
    pub start_date: NaiveDate,

    #[serde(with = "dates::date")]
    pub end_date: NaiveDate,

    /// Articles collected across all passes
    #[serde(default)]
    pub collected: u32,

    #[serde(default = "enabled_default")]
    pub enabled: bool,

    /// Set once a crawl pass reports zero new documents
    #[serde(default)]
    pub complete: bool,

    #[serde(default, with = "dates::option_datetime")]
    pub last_run: Option<DateTime<Utc>>,
}

fn enabled_default() -> bool {
    true
}

impl Query {
    /// Creates a new Query
    ///
    /// # Returns
    ///
    /// * `Ok(Query)` - A fresh, enabled query
    /// * `Err(ConfigError::InvalidDate)` - `end_date` precedes `start_date`
    pub fn new(
        source: &str,
        term: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, ConfigError> {
        if end_date < start_date {
            return Err(ConfigError::InvalidDate(format!(
                "end date {} is before start date {}",
                end_date, start_date
            )));
        }

        Ok(Self {
            name: Self::derive_name(source, term, start_date, end_date),
            source: source.to_string(),
            term: term.to_string(),
            start_date,
            end_date,
            collected: 0,
            enabled: true,
            complete: false,
            last_run: None,
        })
    }

    /// Derives the deterministic query name
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use corpus_ripple::model::Query;
    ///
    /// let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
    /// assert_eq!(
    ///     Query::derive_name("example", "humanities", start, end),
    ///     "example_humanities_2019-01-01_2019-12-31"
    /// );
    /// ```
    pub fn derive_name(source: &str, term: &str, start_date: NaiveDate, end_date: NaiveDate) -> String {
        format!(
            "{}_{}_{}_{}",
            source,
            term,
            start_date.format("%Y-%m-%d"),
            end_date.format("%Y-%m-%d")
        )
    }

    /// Returns true if this query should be crawled in the current pass
    pub fn is_runnable(&self, force: bool) -> bool {
        self.enabled && (force || !self.complete)
    }

    /// Commits the outcome of a crawl pass
    ///
    /// A pass with zero new documents marks the query complete; this is a
    /// normal outcome, not an error.
    pub fn record_pass(&mut self, new_documents: u32, at: DateTime<Utc>) {
        self.collected = self.collected.saturating_add(new_documents);
        self.complete = new_documents == 0;
        self.last_run = Some(at);
    }

    /// Commits the documents of an interrupted pass without settling completion
    pub fn record_partial(&mut self, new_documents: u32, at: DateTime<Utc>) {
        self.collected = self.collected.saturating_add(new_documents);
        self.last_run = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_identical_queries_collide() {
        let a = Query::new("src", "arts", date(2019, 1, 1), date(2019, 6, 30)).unwrap();
        let b = Query::new("src", "arts", date(2019, 1, 1), date(2019, 6, 30)).unwrap();
        assert_eq!(a.name, b.name);
        assert_eq!(a.name, "src_arts_2019-01-01_2019-06-30");
    }

    #[test]
    fn test_rejects_inverted_range() {
        assert!(Query::new("src", "arts", date(2019, 2, 1), date(2019, 1, 1)).is_err());
        assert!(Query::new("src", "arts", date(2019, 1, 1), date(2019, 1, 1)).is_ok());
    }

    #[test]
    fn test_record_pass() {
        let mut q = Query::new("src", "arts", date(2019, 1, 1), date(2019, 1, 31)).unwrap();
        let now = Utc::now();

        q.record_pass(4, now);
        assert_eq!(q.collected, 4);
        assert!(!q.complete);
        assert!(q.is_runnable(false));

        q.record_pass(0, now);
        assert_eq!(q.collected, 4);
        assert!(q.complete);
        assert!(!q.is_runnable(false));
        assert!(q.is_runnable(true));
        assert_eq!(q.last_run, Some(now));
    }

    #[test]
    fn test_partial_pass_keeps_completion() {
        let mut q = Query::new("src", "arts", date(2019, 1, 1), date(2019, 1, 31)).unwrap();
        q.record_partial(0, Utc::now());
        assert!(!q.complete);
        q.record_partial(2, Utc::now());
        assert_eq!(q.collected, 2);
    }

    #[test]
    fn test_serialized_dates() {
        let q = Query::new("src", "arts", date(2019, 1, 1), date(2019, 1, 31)).unwrap();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["start_date"], "2019-01-01T00:00:00Z");
        assert_eq!(json["end_date"], "2019-01-31T00:00:00Z");

        let back: Query = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }
}

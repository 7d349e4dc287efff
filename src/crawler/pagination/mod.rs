//! Pagination engines for the two supported platforms
//!
//! Both engines share one shape: a cursor over page numbers that
//! fast-forwards past pages whose request URL was already fetched, fetches
//! the next page as JSON through the caller's [`Fetcher`], and stops on a
//! platform-specific end-of-results condition. An engine is a lazy, finite,
//! non-restartable sequence of pages; callers pull one page at a time and
//! may stop early.

mod search_api;
mod wordpress;

pub use search_api::SearchApiPages;
pub use wordpress::WordpressPages;

use crate::crawler::fetcher::Fetcher;
use crate::filter::QueryStops;
use crate::model::Platform;
use crate::url::matching_stopword;
use async_trait::async_trait;
use serde_json::Value;

/// One page of raw platform output
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Request URL, credentials redacted; the page's dedup key
    pub url: String,

    /// Decoded page payload
    pub payload: Value,

    /// Page number within its endpoint, starting at 1
    pub number: u32,

    pub platform: Platform,
}

/// A pull-based sequence of result pages
#[async_trait]
pub trait Paginator: Send {
    /// Fetches the next page, or `None` once results are exhausted
    ///
    /// The fetcher is borrowed per call so the caller can use the same
    /// session for article requests between pages.
    async fn next_page(&mut self, fetcher: &mut dyn Fetcher) -> Option<RawPage>;

    /// Pages skipped and yielded so far
    fn cursor(&self) -> &PageCursor;
}

/// Page-number state shared by both engines
#[derive(Debug, Clone)]
pub struct PageCursor {
    /// Next page number to consider, starting at 1
    pub page: u32,

    /// Pages passed over because their URL was already fetched
    pub skipped: u32,

    /// Pages handed to the caller
    pub yielded: u32,

    /// Highest page number that may be requested
    pub limit: Option<u32>,

    /// A page fetch failed transiently, so results may remain unseen
    pub failed: bool,
}

impl PageCursor {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            page: 1,
            skipped: 0,
            yielded: 0,
            limit,
            failed: false,
        }
    }

    /// Resets the page counter for a new endpoint, keeping the totals
    pub fn restart(&mut self) {
        self.page = 1;
    }

    /// Returns true once the page counter has passed the limit
    pub fn exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.page > limit)
    }

    /// Fast-forwards to the next page worth requesting
    ///
    /// Pages whose URL is already in `stops` are skipped. A page URL that
    /// matches a stopword ends pagination, since every later page would
    /// match too.
    ///
    /// # Returns
    ///
    /// * `Some(String)` - URL of the page to request next
    /// * `None` - The limit was reached or the URL is stopworded
    pub fn advance<F>(&mut self, stops: &QueryStops, stopwords: &[String], url_for: F) -> Option<String>
    where
        F: Fn(u32) -> String,
    {
        loop {
            if self.exhausted() {
                tracing::debug!("Page limit {:?} reached", self.limit);
                return None;
            }

            let url = url_for(self.page);
            if let Some(word) = matching_stopword(&url, stopwords) {
                tracing::warn!("Page URL {} matches stopword '{}', stopping", url, word);
                return None;
            }

            if stops.contains(&url) {
                tracing::debug!("Skipping already fetched page {}", url);
                self.skipped += 1;
                self.page += 1;
                continue;
            }

            return Some(url);
        }
    }

    /// Records a yielded page and moves past it
    pub fn mark_yielded(&mut self) {
        self.yielded += 1;
        self.page += 1;
    }
}

/// Percent-encodes a query-string value
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

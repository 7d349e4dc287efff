use crate::crawler::fetcher::Fetcher;
use crate::crawler::pagination::{encode, PageCursor, Paginator, RawPage};
use crate::filter::QueryStops;
use crate::model::Platform;
use crate::url::base_url;
use async_trait::async_trait;

/// WordPress REST search, walking each document endpoint in turn
///
/// Each page is a JSON array of documents. An endpoint is finished when a
/// page is not an array, is empty, or holds fewer items than the platform's
/// fixed page size (that short page is still yielded).
pub struct WordpressPages {
    api_root: String,
    term: String,
    endpoints: Vec<String>,
    current: usize,
    page_size: usize,
    cursor: PageCursor,
    stops: QueryStops,
    stopwords: Vec<String>,
}

impl WordpressPages {
    /// # Arguments
    ///
    /// * `api_root` - REST root, e.g. `https://example.com/wp-json/wp/v2`
    /// * `term` - Search term
    /// * `endpoints` - Document routes to search, in order
    /// * `page_size` - Fixed page size of the platform
    /// * `limit` - Highest page number per endpoint
    /// * `stops` - Dedup set of the query being crawled
    /// * `stopwords` - URL substrings that are never fetched
    pub fn new(
        api_root: &str,
        term: &str,
        endpoints: Vec<String>,
        page_size: usize,
        limit: Option<u32>,
        stops: QueryStops,
        stopwords: Vec<String>,
    ) -> Self {
        Self {
            api_root: base_url(api_root),
            term: term.to_string(),
            endpoints,
            current: 0,
            page_size,
            cursor: PageCursor::new(limit),
            stops,
            stopwords,
        }
    }

    /// Builds the search URL for one page of one endpoint
    ///
    /// ```
    /// use corpus_ripple::crawler::pagination::WordpressPages;
    ///
    /// assert_eq!(
    ///     WordpressPages::page_url("https://example.com/wp-json/wp/v2", "posts", "liberal arts", 2),
    ///     "https://example.com/wp-json/wp/v2/posts?search=liberal+arts&sentence=1&page=2"
    /// );
    /// ```
    pub fn page_url(api_root: &str, endpoint: &str, term: &str, page: u32) -> String {
        format!(
            "{}/{}?search={}&sentence=1&page={}",
            base_url(api_root),
            endpoint,
            encode(term),
            page
        )
    }

    fn finish_endpoint(&mut self) {
        self.current += 1;
        self.cursor.restart();
    }
}

#[async_trait]
impl Paginator for WordpressPages {
    async fn next_page(&mut self, fetcher: &mut dyn Fetcher) -> Option<RawPage> {
        loop {
            let endpoint = self.endpoints.get(self.current)?.clone();

            let (root, term) = (self.api_root.clone(), self.term.clone());
            let next = self.cursor.advance(&self.stops, &self.stopwords, |page| {
                Self::page_url(&root, &endpoint, &term, page)
            });
            let Some(url) = next else {
                self.finish_endpoint();
                continue;
            };

            let Some(payload) = fetcher.fetch_json(&url).await else {
                if fetcher.last_failed_transiently() {
                    tracing::warn!("Fetch of {} failed, '{}' left unfinished", url, endpoint);
                    self.cursor.failed = true;
                } else {
                    tracing::info!("No readable response at {}, ending '{}'", url, endpoint);
                }
                self.finish_endpoint();
                continue;
            };

            let len = match payload.as_array() {
                Some(items) if !items.is_empty() => items.len(),
                _ => {
                    tracing::info!("Out of pages or no content at {}", url);
                    self.finish_endpoint();
                    continue;
                }
            };

            self.stops.insert(&url);
            let page = RawPage {
                url,
                payload,
                number: self.cursor.page,
                platform: Platform::Wordpress,
            };
            self.cursor.mark_yielded();

            if len < self.page_size {
                tracing::debug!("Short page ({} < {}), '{}' is done", len, self.page_size, endpoint);
                self.finish_endpoint();
            }

            return Some(page);
        }
    }

    fn cursor(&self) -> &PageCursor {
        &self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::pagination::testing::CannedFetcher;
    use crate::filter::DedupSet;
    use serde_json::{json, Value};

    const ROOT: &str = "https://example.com/wp-json/wp/v2";

    fn posts(n: usize) -> Value {
        Value::Array((0..n).map(|i| json!({"link": format!("https://example.com/{}", i)})).collect())
    }

    fn url(endpoint: &str, page: u32) -> String {
        WordpressPages::page_url(ROOT, endpoint, "arts", page)
    }

    fn engine(endpoints: &[&str], limit: Option<u32>, stops: QueryStops) -> WordpressPages {
        WordpressPages::new(
            ROOT,
            "arts",
            endpoints.iter().map(|e| e.to_string()).collect(),
            10,
            limit,
            stops,
            Vec::new(),
        )
    }

    async fn drain(engine: &mut WordpressPages, fetcher: &mut CannedFetcher) -> Vec<RawPage> {
        let mut pages = Vec::new();
        while let Some(page) = engine.next_page(fetcher).await {
            pages.push(page);
        }
        pages
    }

    #[tokio::test]
    async fn test_short_page_ends_endpoint() {
        let mut fetcher = CannedFetcher::default()
            .with(&url("posts", 1), posts(10))
            .with(&url("posts", 2), posts(3))
            .with(&url("posts", 3), posts(10));

        let mut engine = engine(&["posts"], None, DedupSet::new().scope("q"));
        let pages = drain(&mut engine, &mut fetcher).await;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].number, 2);
        assert_eq!(fetcher.requested, vec![url("posts", 1), url("posts", 2)]);
    }

    #[tokio::test]
    async fn test_empty_or_non_array_ends_endpoint() {
        let mut fetcher = CannedFetcher::default()
            .with(&url("posts", 1), posts(10))
            .with(&url("posts", 2), json!([]))
            .with(&url("pages", 1), json!({"code": "rest_invalid"}));

        let mut engine = engine(&["posts", "pages"], None, DedupSet::new().scope("q"));
        let pages = drain(&mut engine, &mut fetcher).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(fetcher.requested.len(), 3);
    }

    #[tokio::test]
    async fn test_walks_each_endpoint() {
        let mut fetcher = CannedFetcher::default()
            .with(&url("posts", 1), posts(2))
            .with(&url("pages", 1), posts(1));

        let mut engine = engine(&["posts", "pages"], None, DedupSet::new().scope("q"));
        let pages = drain(&mut engine, &mut fetcher).await;

        let urls: Vec<_> = pages.iter().map(|p| p.url.clone()).collect();
        assert_eq!(urls, vec![url("posts", 1), url("pages", 1)]);
        assert_eq!(engine.cursor().yielded, 2);
    }

    #[tokio::test]
    async fn test_page_limit() {
        let mut fetcher = CannedFetcher::default()
            .with(&url("posts", 1), posts(10))
            .with(&url("posts", 2), posts(10))
            .with(&url("posts", 3), posts(10));

        let mut engine = engine(&["posts"], Some(2), DedupSet::new().scope("q"));
        assert_eq!(drain(&mut engine, &mut fetcher).await.len(), 2);
    }

    #[tokio::test]
    async fn test_resumes_past_fetched_pages() {
        let stops = DedupSet::new().scope("q");
        stops.insert(&url("posts", 1));

        let mut fetcher = CannedFetcher::default()
            .with(&url("posts", 1), posts(10))
            .with(&url("posts", 2), posts(4));

        let mut engine = engine(&["posts"], None, stops.clone());
        let pages = drain(&mut engine, &mut fetcher).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 2);
        assert_eq!(engine.cursor().skipped, 1);
        assert!(stops.contains(&url("posts", 2)));
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_endpoint() {
        let mut fetcher = CannedFetcher::default();
        let mut engine = engine(&["posts"], None, DedupSet::new().scope("q"));
        assert!(engine.next_page(&mut fetcher).await.is_none());
        assert!(engine.next_page(&mut fetcher).await.is_none());
        assert_eq!(fetcher.requested.len(), 1);
        assert!(!engine.cursor().failed);
    }

    #[tokio::test]
    async fn test_outage_marks_cursor_failed() {
        let mut fetcher = CannedFetcher::default()
            .with(&url("pages", 1), posts(2))
            .down();
        let mut engine = engine(&["posts", "pages"], None, DedupSet::new().scope("q"));
        let pages = drain(&mut engine, &mut fetcher).await;

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, url("pages", 1));
        assert!(engine.cursor().failed);
    }
}

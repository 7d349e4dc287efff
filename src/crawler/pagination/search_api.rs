use crate::config::SearchApiConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::pagination::{encode, PageCursor, Paginator, RawPage};
use crate::filter::QueryStops;
use crate::model::Platform;
use crate::url::site_prefix;
use async_trait::async_trait;

/// Results per page of the web-search API
pub const RESULTS_PER_PAGE: u32 = 10;

const CX_PLACEHOLDER: &str = "{cx}";
const KEY_PLACEHOLDER: &str = "{key}";

/// Generic web-search API restricted to one site
///
/// Each page is a JSON object with results under `items`. Pagination ends
/// when a page carries an `error`, has no or empty `items`, or its
/// `queries.nextPage` is absent (that last page is still yielded).
///
/// Request URLs are built with `{cx}` and `{key}` placeholders, and the real
/// credentials are substituted only for the outgoing request, so dedup keys
/// and stored Responses never contain secrets.
pub struct SearchApiPages {
    endpoint: String,
    cx: String,
    key: String,
    site: String,
    term: String,
    cursor: PageCursor,
    stops: QueryStops,
    stopwords: Vec<String>,
    done: bool,
}

impl SearchApiPages {
    pub fn new(
        api: &SearchApiConfig,
        site: &str,
        term: &str,
        limit: Option<u32>,
        stops: QueryStops,
        stopwords: Vec<String>,
    ) -> Self {
        Self {
            endpoint: api.endpoint.clone(),
            cx: api.cx.clone(),
            key: api.key.clone(),
            site: site_prefix(site),
            term: term.to_string(),
            cursor: PageCursor::new(limit),
            stops,
            stopwords,
            done: false,
        }
    }

    /// Builds the redacted request URL for one page
    ///
    /// ```
    /// use corpus_ripple::crawler::pagination::SearchApiPages;
    ///
    /// assert_eq!(
    ///     SearchApiPages::page_url("https://api.example/v1", "example.com/news", "arts", 3),
    ///     "https://api.example/v1?cx={cx}&key={key}&siteSearch=example.com%2Fnews&q=arts&start=21"
    /// );
    /// ```
    pub fn page_url(endpoint: &str, site: &str, term: &str, page: u32) -> String {
        let start = page.saturating_sub(1) * RESULTS_PER_PAGE + 1;
        format!(
            "{}?cx={}&key={}&siteSearch={}&q={}&start={}",
            endpoint,
            CX_PLACEHOLDER,
            KEY_PLACEHOLDER,
            encode(site),
            encode(term),
            start
        )
    }

    /// Substitutes the real credentials into a redacted URL
    fn with_credentials(&self, redacted: &str) -> String {
        redacted
            .replacen(CX_PLACEHOLDER, &encode(&self.cx), 1)
            .replacen(KEY_PLACEHOLDER, &encode(&self.key), 1)
    }
}

#[async_trait]
impl Paginator for SearchApiPages {
    async fn next_page(&mut self, fetcher: &mut dyn Fetcher) -> Option<RawPage> {
        if self.done {
            return None;
        }

        let (endpoint, site, term) = (self.endpoint.clone(), self.site.clone(), self.term.clone());
        let next = self.cursor.advance(&self.stops, &self.stopwords, |page| {
            Self::page_url(&endpoint, &site, &term, page)
        });
        let Some(url) = next else {
            self.done = true;
            return None;
        };

        let Some(payload) = fetcher.fetch_json(&self.with_credentials(&url)).await else {
            if fetcher.last_failed_transiently() {
                tracing::warn!("Fetch of {} failed, results left unfinished", url);
                self.cursor.failed = true;
            } else {
                tracing::info!("No readable response at {}", url);
            }
            self.done = true;
            return None;
        };

        if let Some(error) = payload.get("error") {
            tracing::warn!("Search API error at {}: {}", url, error);
            self.done = true;
            return None;
        }

        let has_items = payload
            .get("items")
            .and_then(|items| items.as_array())
            .is_some_and(|items| !items.is_empty());
        if !has_items {
            tracing::info!("Out of pages or no content at {}", url);
            self.done = true;
            return None;
        }

        if payload.pointer("/queries/nextPage").is_none() {
            self.done = true;
        }

        self.stops.insert(&url);
        let page = RawPage {
            url,
            payload,
            number: self.cursor.page,
            platform: Platform::SearchApi,
        };
        self.cursor.mark_yielded();

        Some(page)
    }

    fn cursor(&self) -> &PageCursor {
        &self.cursor
    }
}

use chrono::NaiveDate;
use serde::Deserialize;

/// Main configuration structure for Corpus-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub wordpress: WordpressConfig,
    #[serde(rename = "search-api", default)]
    pub search_api: SearchApiConfig,
    pub output: OutputConfig,
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceEntry>,
    #[serde(rename = "query", default)]
    pub queries: Vec<QueryEntry>,
}

/// Crawl pacing and pagination limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Number of independent fetch workers (one browser session each)
    pub workers: u32,

    /// Maximum WordPress result pages per endpoint, or -1 for no limit
    pub page_limit: i64,

    /// Maximum search-API result pages, or -1 for no limit
    pub search_page_limit: i64,

    /// Lower bound of the randomized delay between fetches (milliseconds)
    pub min_sleep_ms: u64,

    /// Upper bound of the randomized delay between fetches (milliseconds)
    pub max_sleep_ms: u64,

    /// Extra attempts for transport failures
    pub retries: u32,

    /// How long a worker waits for a backend session slot (seconds)
    pub session_timeout_secs: u64,

    /// Run the WordPress capability probe on newly imported sources
    pub probe_sources: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            page_limit: -1,
            search_page_limit: 10,
            min_sleep_ms: 1000,
            max_sleep_ms: 3000,
            retries: 2,
            session_timeout_secs: 60,
            probe_sources: true,
        }
    }
}

impl CrawlerConfig {
    /// WordPress page cap as an option (`None` = unlimited)
    pub fn wordpress_page_limit(&self) -> Option<u32> {
        page_limit_from(self.page_limit)
    }

    /// Search-API page cap as an option (`None` = unlimited)
    pub fn search_page_limit(&self) -> Option<u32> {
        page_limit_from(self.search_page_limit)
    }
}

fn page_limit_from(raw: i64) -> Option<u32> {
    if raw < 0 {
        None
    } else {
        Some(u32::try_from(raw).unwrap_or(u32::MAX))
    }
}

/// Which fetch backend a worker drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct HTTP requests, no rendering
    Http,
    /// Remote browser session through a WebDriver hub
    Webdriver,
}

/// Fetch backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetcherConfig {
    pub backend: BackendKind,

    /// WebDriver hub URL, e.g. `http://localhost:4444/wd/hub`
    pub hub_url: String,

    /// Browser name requested from the hub
    pub browser: String,

    /// User agent for the HTTP backend
    pub user_agent: String,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Substrings of the landing URL that identify a bot-challenge page
    pub challenge_markers: Vec<String>,

    /// Substrings of the page body that identify a bot-challenge page
    pub challenge_body_markers: Vec<String>,

    /// Ask for a keypress when a challenge page is detected
    pub wait_for_keypress: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Http,
            hub_url: String::new(),
            browser: "chrome".to_string(),
            user_agent: format!("CorpusRipple/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            challenge_markers: vec!["/sorry/".to_string()],
            challenge_body_markers: Vec::new(),
            wait_for_keypress: false,
        }
    }
}

/// Content extraction settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractorConfig {
    /// Elements whose text is this short or shorter are ignored
    pub min_length: usize,

    /// Candidate tag names, tried in order
    pub tags: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_length: 75,
            tags: vec!["p".to_string(), "div".to_string(), "span".to_string()],
        }
    }
}

/// URL filtering settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterConfig {
    /// URLs containing any of these substrings are never fetched
    pub url_stopwords: Vec<String>,
}

/// WordPress REST search settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WordpressConfig {
    /// Document routes to search, in order
    pub endpoints: Vec<String>,

    /// Fixed page size of the platform; a shorter page is the last one
    pub page_size: usize,
}

impl Default for WordpressConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["posts".to_string(), "pages".to_string()],
            page_size: 10,
        }
    }
}

/// Generic web-search API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SearchApiConfig {
    pub endpoint: String,

    /// Search engine ID
    pub cx: String,

    /// API key
    pub key: String,
}

impl Default for SearchApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            cx: String::new(),
            key: String::new(),
        }
    }
}

impl SearchApiConfig {
    /// Returns true when credentials are present
    pub fn is_configured(&self) -> bool {
        !self.cx.is_empty() && !self.key.is_empty()
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Directory for JSON article export
    #[serde(default = "default_export_path")]
    pub export_path: String,
}

fn default_export_path() -> String {
    "./export".to_string()
}

/// A site to query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceEntry {
    /// Unique name, used as the external identity
    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Base site URL
    pub webpage: String,

    /// Known WordPress API root; leave empty to rely on the capability probe
    #[serde(default)]
    pub wordpress_endpoint: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub country: String,

    #[serde(default)]
    pub copyright: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_language() -> String {
    "en-US".to_string()
}

/// One or more search terms over a date range, scoped to a source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryEntry {
    pub source: String,
    pub terms: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

//! Fetcher contract and the direct-HTTP backend
//!
//! This module defines the two layers every crawl request passes through:
//! - [`Backend`]: a raw page source that can navigate to a URL and re-read
//!   the current page (direct HTTP or a remote browser)
//! - [`Fetcher`]: the contract the pagination engines depend on. A fetch
//!   yields text or parsed JSON, or nothing; failures are logged and never
//!   surface as errors.

use crate::config::{BackendKind, Config, FetcherConfig};
use crate::crawler::guard::SessionGuard;
use crate::crawler::webdriver::WebDriverBackend;
use crate::crawler::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Content returned by a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw page text
    Text(String),
    /// Decoded JSON document
    Json(Value),
}

/// A page as seen by a backend after navigation
#[derive(Debug, Clone)]
pub struct Page {
    /// URL the backend ended up on, after redirects
    pub url: String,
    /// Raw page source
    pub body: String,
}

/// A raw page source
///
/// Backends are stateful: the remote-browser backend drives one session and
/// must be used sequentially, so every method takes `&mut self`.
#[async_trait]
pub trait Backend: Send {
    /// Short backend name, for logs
    fn name(&self) -> &'static str;

    /// Navigates to `url` and returns the resulting page
    async fn navigate(&mut self, url: &Url) -> Result<Page, FetchError>;

    /// Re-reads the current page
    async fn current(&mut self) -> Result<Page, FetchError>;

    /// Releases the backend session
    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Retrieves a URL as text or JSON
///
/// Implementations never return partial data: a fetch either yields a
/// complete payload or `None`, and logs why.
#[async_trait]
pub trait Fetcher: Send {
    /// Fetches `url`, decoding JSON when `expect_json` is set
    async fn fetch(&mut self, url: &str, expect_json: bool) -> Option<Payload>;

    /// Releases the underlying session; later fetches return `None`
    async fn close(&mut self);

    /// Returns true if the last fetch failed in a way a later run may not
    ///
    /// Transport errors, rate limiting, server errors and a closed session
    /// qualify. A client error or an undecodable body is a real answer.
    fn last_failed_transiently(&self) -> bool {
        false
    }

    /// Fetches `url` as a JSON document
    async fn fetch_json(&mut self, url: &str) -> Option<Value> {
        match self.fetch(url, true).await {
            Some(Payload::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// Fetches `url` as raw text
    async fn fetch_text(&mut self, url: &str) -> Option<String> {
        match self.fetch(url, false).await {
            Some(Payload::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Stateless direct-request backend
///
/// Low overhead, no JavaScript rendering. Redirects are followed by the
/// client; the final URL is reported on the page.
pub struct HttpBackend {
    client: Client,
    last: Option<Url>,
    closed: bool,
}

impl HttpBackend {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client =
            build_http_client(config).map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            last: None,
            closed: false,
        })
    }

    async fn get(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Page {
            url: final_url,
            body,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn navigate(&mut self, url: &Url) -> Result<Page, FetchError> {
        if self.closed {
            return Err(FetchError::Closed);
        }
        self.last = Some(url.clone());
        self.get(url).await
    }

    async fn current(&mut self) -> Result<Page, FetchError> {
        if self.closed {
            return Err(FetchError::Closed);
        }
        match self.last.clone() {
            Some(url) => self.get(&url).await,
            None => Err(FetchError::Protocol("no page loaded".to_string())),
        }
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.closed = true;
        self.last = None;
        Ok(())
    }
}

/// Builds the configured fetcher for one worker
///
/// The backend is chosen once, here. Every fetcher is wrapped in a
/// [`SessionGuard`] so pacing, retries and challenge detection apply to
/// every request.
///
/// # Returns
///
/// * `Ok(Box<dyn Fetcher>)` - A ready fetcher owning its own session
/// * `Err(FetchError)` - The backend could not be started (for the remote
///   browser, including a session-slot timeout)
pub async fn build_fetcher(config: &Config) -> Result<Box<dyn Fetcher>, FetchError> {
    match config.fetcher.backend {
        BackendKind::Http => {
            let backend = HttpBackend::new(&config.fetcher)?;
            Ok(Box::new(SessionGuard::new(backend, config)))
        }
        BackendKind::Webdriver => {
            let backend = WebDriverBackend::connect(&config.fetcher, &config.crawler).await?;
            Ok(Box::new(SessionGuard::new(backend, config)))
        }
    }
}

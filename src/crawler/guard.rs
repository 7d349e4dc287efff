//! Rate limiting, retry and bot-challenge handling around a backend
//!
//! Every request a worker makes goes through a [`SessionGuard`]:
//! - a uniformly random pause between consecutive fetches
//! - bounded exponential-backoff retries for transport failures only
//! - challenge-page detection, blocking until the challenge clears
//! - JSON decoding, including JSON a browser rendered inside `<pre>`

use crate::config::Config;
use crate::crawler::fetcher::{Backend, Fetcher, Page, Payload};
use crate::crawler::FetchError;
use crate::extract::stub;
use crate::url::normalize_url;
use async_trait::async_trait;
use rand::Rng;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Longest delay between retry attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Wraps a [`Backend`] and implements the [`Fetcher`] contract on top of it
pub struct SessionGuard<B: Backend> {
    backend: B,
    min_sleep: Duration,
    max_sleep: Duration,
    retries: u32,
    url_markers: Vec<String>,
    body_markers: Vec<String>,
    wait_for_keypress: bool,
    fetched_once: bool,
    transient_failure: bool,
    closed: bool,
}

impl<B: Backend> SessionGuard<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self {
            backend,
            min_sleep: Duration::from_millis(config.crawler.min_sleep_ms),
            max_sleep: Duration::from_millis(config.crawler.max_sleep_ms),
            retries: config.crawler.retries,
            url_markers: config.fetcher.challenge_markers.clone(),
            body_markers: config.fetcher.challenge_body_markers.clone(),
            wait_for_keypress: config.fetcher.wait_for_keypress,
            fetched_once: false,
            transient_failure: false,
            closed: false,
        }
    }

    /// Picks a uniformly random delay in `[min_sleep, max_sleep]`
    fn random_delay(&self) -> Duration {
        let min = self.min_sleep.as_millis() as u64;
        let max = self.max_sleep.as_millis() as u64;
        if max <= min {
            return self.min_sleep;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Sleeps between consecutive fetches; the first fetch goes out at once
    async fn pace(&mut self) {
        if self.fetched_once {
            let delay = self.random_delay();
            if !delay.is_zero() {
                tracing::trace!("Sleeping {:?} before next fetch", delay);
                tokio::time::sleep(delay).await;
            }
        }
        self.fetched_once = true;
    }

    async fn navigate_with_retry(&mut self, url: &Url) -> Result<Page, FetchError> {
        let mut attempt = 0;
        loop {
            match self.backend.navigate(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let delay = backoff_delay(self.min_sleep, attempt);
                    tracing::debug!(
                        "Transient failure for {} ({}), retrying in {:?} (attempt {}/{})",
                        url,
                        e,
                        delay,
                        attempt,
                        self.retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn challenge_marker(&self, page: &Page) -> Option<&str> {
        self.url_markers
            .iter()
            .find(|m| page.url.contains(m.as_str()))
            .or_else(|| self.body_markers.iter().find(|m| page.body.contains(m.as_str())))
            .map(|m| m.as_str())
    }

    /// Blocks until the current page is no longer a challenge page
    async fn clear_challenge(&mut self, mut page: Page) -> Result<Page, FetchError> {
        let Some(marker) = self.challenge_marker(&page).map(str::to_string) else {
            return Ok(page);
        };

        tracing::warn!(
            "Challenge page detected at {} (marker '{}'), waiting for it to clear",
            page.url,
            marker
        );

        if self.wait_for_keypress {
            wait_for_enter().await;
        }

        let interval = self.min_sleep.max(Duration::from_millis(100));
        while self.challenge_marker(&page).is_some() {
            tokio::time::sleep(interval).await;
            page = self.backend.current().await?;
        }

        tracing::info!("Challenge cleared, continuing at {}", page.url);
        Ok(page)
    }
}

#[async_trait]
impl<B: Backend> Fetcher for SessionGuard<B> {
    async fn fetch(&mut self, url: &str, expect_json: bool) -> Option<Payload> {
        self.transient_failure = self.closed;
        if self.closed {
            tracing::warn!("Fetch of {} after the session was closed", url);
            return None;
        }

        let target = match normalize_url(url) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Not fetching '{}': {}", url, e);
                return None;
            }
        };

        self.pace().await;
        tracing::debug!("Fetching {} via {}", target, self.backend.name());

        let page = match self.navigate_with_retry(&target).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", target, e);
                self.transient_failure = e.is_transient();
                return None;
            }
        };

        let page = match self.clear_challenge(page).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Lost page {} while waiting on a challenge: {}", target, e);
                self.transient_failure = true;
                return None;
            }
        };

        if !expect_json {
            return Some(Payload::Text(page.body));
        }

        match decode_json(&page.body) {
            Some(value) => Some(Payload::Json(value)),
            None => {
                tracing::warn!("Could not decode JSON from {}: {}", target, stub(&page.body));
                None
            }
        }
    }

    fn last_failed_transiently(&self) -> bool {
        self.transient_failure
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.backend.close().await {
            tracing::warn!("Error closing {} session: {}", self.backend.name(), e);
        }
    }
}

/// Decodes a JSON document from a raw body
///
/// Browsers render JSON responses as HTML with the document inside a `<pre>`
/// element, so that is tried when the raw body is not JSON.
pub fn decode_json(body: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(body.trim()) {
        return Some(value);
    }

    let document = Html::parse_document(body);
    let selector = Selector::parse("pre").ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    serde_json::from_str(text.trim()).ok()
}

/// Exponential backoff from `base` with ±20% jitter, capped at one minute
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let delay = base.saturating_mul(factor).min(MAX_BACKOFF);
    if delay.is_zero() {
        return delay;
    }
    let jitter = rand::rng().random_range(0.8..1.2);
    delay.mul_f64(jitter).min(MAX_BACKOFF)
}

/// Prompts on the terminal and waits for Enter
async fn wait_for_enter() {
    eprintln!("Challenge page detected. Solve it in the browser, then press Enter to continue.");
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    })
    .await;

    if !matches!(read, Ok(Ok(_))) {
        tracing::warn!("Could not read from stdin, polling for the challenge to clear");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Backend that replays scripted results and records navigations
    struct ScriptedBackend {
        navigations: Arc<Mutex<Vec<String>>>,
        results: VecDeque<Result<Page, FetchError>>,
        current: VecDeque<Page>,
    }

    impl ScriptedBackend {
        fn new(results: Vec<Result<Page, FetchError>>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let navigations = Arc::new(Mutex::new(Vec::new()));
            let backend = Self {
                navigations: navigations.clone(),
                results: results.into(),
                current: VecDeque::new(),
            };
            (backend, navigations)
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn navigate(&mut self, url: &Url) -> Result<Page, FetchError> {
            self.navigations.lock().unwrap().push(url.to_string());
            self.results
                .pop_front()
                .unwrap_or(Err(FetchError::Transport("script exhausted".to_string())))
        }

        async fn current(&mut self) -> Result<Page, FetchError> {
            self.current.pop_front().ok_or(FetchError::Closed)
        }

        async fn close(&mut self) -> Result<(), FetchError> {
            Ok(())
        }
    }

    fn page(url: &str, body: &str) -> Page {
        Page {
            url: url.to_string(),
            body: body.to_string(),
        }
    }

    fn config() -> Config {
        parse_config(
            r#"
[crawler]
min-sleep-ms = 0
max-sleep-ms = 0
retries = 2

[output]
database-path = "test.db"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_normalizes_scheme_less_urls() {
        let (backend, navigations) = ScriptedBackend::new(vec![Ok(page("http://example.com/", "hi"))]);
        let mut guard = SessionGuard::new(backend, &config());

        let text = guard.fetch_text("example.com").await;
        assert_eq!(text.as_deref(), Some("hi"));
        assert_eq!(navigations.lock().unwrap()[0], "http://example.com/");
    }

    #[tokio::test]
    async fn test_retries_transport_failures_only() {
        let (backend, navigations) = ScriptedBackend::new(vec![
            Err(FetchError::Transport("reset".to_string())),
            Ok(page("http://example.com/", "[1]")),
        ]);
        let mut guard = SessionGuard::new(backend, &config());
        assert_eq!(guard.fetch_json("http://example.com/").await, Some(json!([1])));
        assert_eq!(navigations.lock().unwrap().len(), 2);

        let (backend, navigations) =
            ScriptedBackend::new(vec![Err(FetchError::Status(404)), Ok(page("x", "[]"))]);
        let mut guard = SessionGuard::new(backend, &config());
        assert_eq!(guard.fetch_json("http://example.com/").await, None);
        assert_eq!(navigations.lock().unwrap().len(), 1);
        assert!(!guard.last_failed_transiently());
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (backend, navigations) = ScriptedBackend::new(vec![]);
        let mut guard = SessionGuard::new(backend, &config());
        assert_eq!(guard.fetch_text("http://example.com/").await, None);
        assert_eq!(navigations.lock().unwrap().len(), 3);
        assert!(guard.last_failed_transiently());
    }

    #[tokio::test]
    async fn test_transient_flag_resets_on_success() {
        let (backend, _) = ScriptedBackend::new(vec![
            Err(FetchError::Status(503)),
            Err(FetchError::Status(503)),
            Err(FetchError::Status(503)),
            Ok(page("http://example.com/", "[]")),
        ]);
        let mut guard = SessionGuard::new(backend, &config());
        assert_eq!(guard.fetch_json("http://example.com/").await, None);
        assert!(guard.last_failed_transiently());

        assert_eq!(guard.fetch_json("http://example.com/").await, Some(json!([])));
        assert!(!guard.last_failed_transiently());
    }

    #[tokio::test]
    async fn test_decode_failure_is_none() {
        let (backend, _) = ScriptedBackend::new(vec![Ok(page("http://example.com/", "<html>nope</html>"))]);
        let mut guard = SessionGuard::new(backend, &config());
        assert_eq!(guard.fetch_json("http://example.com/").await, None);
        assert!(!guard.last_failed_transiently());
    }

    #[tokio::test]
    async fn test_waits_out_challenge() {
        let (mut backend, _) =
            ScriptedBackend::new(vec![Ok(page("http://example.com/sorry/index", "captcha"))]);
        backend.current.push_back(page("http://example.com/sorry/index", "captcha"));
        backend.current.push_back(page("http://example.com/data", "{\"ok\":true}"));

        let mut guard = SessionGuard::new(backend, &config());
        let value = guard.fetch_json("http://example.com/data").await;
        assert_eq!(value, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_closed_guard_returns_none() {
        let (backend, navigations) = ScriptedBackend::new(vec![Ok(page("x", "y"))]);
        let mut guard = SessionGuard::new(backend, &config());
        guard.close().await;
        assert_eq!(guard.fetch_text("http://example.com/").await, None);
        assert!(guard.last_failed_transiently());
        assert!(navigations.lock().unwrap().is_empty());
    }

    #[test]
    fn test_decode_json_from_pre() {
        let body = "<html><body><pre>{\"a\": [1, 2]}</pre></body></html>";
        assert_eq!(decode_json(body), Some(json!({"a": [1, 2]})));
        assert_eq!(decode_json(" [1] "), Some(json!([1])));
        assert_eq!(decode_json("<p>no</p>"), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert!(backoff_delay(Duration::ZERO, 3).is_zero());
        let first = backoff_delay(Duration::from_secs(1), 1);
        assert!(first >= Duration::from_millis(800) && first <= Duration::from_millis(1200));
        assert!(backoff_delay(Duration::from_secs(10), 10) <= MAX_BACKOFF);
    }
}

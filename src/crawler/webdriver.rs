//! Remote-browser backend speaking the W3C WebDriver protocol
//!
//! The backend talks to a WebDriver hub (for example a Selenium grid) over
//! plain HTTP. It waits for the hub to report a free slot, opens one
//! browser session, and drives it strictly sequentially.

use crate::config::{CrawlerConfig, FetcherConfig};
use crate::crawler::fetcher::{build_http_client, Backend, Page};
use crate::crawler::FetchError;
use crate::url::base_url;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use url::Url;

/// One browser session on a WebDriver hub
pub struct WebDriverBackend {
    client: Client,
    hub: String,
    session_id: Option<String>,
}

impl WebDriverBackend {
    /// Waits for the hub to become ready, then opens a session
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Hub URL, browser name and request timeout
    /// * `crawler` - Session timeout and polling interval
    ///
    /// # Returns
    ///
    /// * `Ok(WebDriverBackend)` - A backend with an open session
    /// * `Err(FetchError::SessionTimeout)` - The hub had no free slot in time
    /// * `Err(FetchError)` - The hub could not be reached or refused the session
    pub async fn connect(
        fetcher: &FetcherConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, FetchError> {
        let client =
            build_http_client(fetcher).map_err(|e| FetchError::Transport(e.to_string()))?;
        let hub = base_url(&fetcher.hub_url);

        let timeout = Duration::from_secs(crawler.session_timeout_secs);
        let poll = Duration::from_millis(crawler.min_sleep_ms).max(Duration::from_millis(50));
        wait_until_ready(&client, &hub, timeout, poll).await?;

        let session_id = create_session(&client, &hub, &fetcher.browser).await?;
        tracing::info!("Opened {} session {} on {}", fetcher.browser, session_id, hub);

        Ok(Self {
            client,
            hub,
            session_id: Some(session_id),
        })
    }

    fn session_url(&self, suffix: &str) -> Result<String, FetchError> {
        let id = self.session_id.as_ref().ok_or(FetchError::Closed)?;
        Ok(format!("{}/session/{}{}", self.hub, id, suffix))
    }

    async fn get_value(&self, suffix: &str) -> Result<Value, FetchError> {
        let url = self.session_url(suffix)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        read_value(response).await
    }
}

#[async_trait]
impl Backend for WebDriverBackend {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    async fn navigate(&mut self, url: &Url) -> Result<Page, FetchError> {
        let endpoint = self.session_url("/url")?;
        let response = self
            .client
            .post(endpoint)
            .json(&json!({ "url": url.as_str() }))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        read_value(response).await?;

        self.current().await
    }

    async fn current(&mut self) -> Result<Page, FetchError> {
        let url = self.get_value("/url").await?;
        let body = self.get_value("/source").await?;

        Ok(Page {
            url: url.as_str().unwrap_or_default().to_string(),
            body: body.as_str().unwrap_or_default().to_string(),
        })
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };

        let response = self
            .client
            .delete(format!("{}/session/{}", self.hub, id))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        read_value(response).await?;

        tracing::info!("Closed webdriver session {}", id);
        Ok(())
    }
}

impl Drop for WebDriverBackend {
    fn drop(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };

        // Best effort: a session that was never closed would hold a hub slot
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let url = format!("{}/session/{}", self.hub, id);
            handle.spawn(async move {
                let _ = client.delete(url).send().await;
            });
        }
    }
}

/// Polls `{hub}/status` until the hub reports `value.ready`
async fn wait_until_ready(
    client: &Client,
    hub: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<(), FetchError> {
    let deadline = Instant::now() + timeout;
    let status_url = format!("{}/status", hub);

    loop {
        match client.get(&status_url).send().await {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) if body.pointer("/value/ready") == Some(&Value::Bool(true)) => {
                    return Ok(());
                }
                Ok(_) => tracing::debug!("Hub {} has no free session slot yet", hub),
                Err(e) => tracing::debug!("Unreadable hub status from {}: {}", hub, e),
            },
            Err(e) => tracing::debug!("Hub {} not reachable: {}", hub, e),
        }

        if Instant::now() >= deadline {
            return Err(FetchError::SessionTimeout);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Opens a new session and returns its ID
async fn create_session(client: &Client, hub: &str, browser: &str) -> Result<String, FetchError> {
    let body = json!({
        "capabilities": {
            "alwaysMatch": { "browserName": browser }
        }
    });

    let response = client
        .post(format!("{}/session", hub))
        .json(&body)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| FetchError::Protocol(e.to_string()))?;

    if !status.is_success() {
        return Err(FetchError::Protocol(error_message(&payload)));
    }

    // Older hubs put the ID at the top level
    payload
        .pointer("/value/sessionId")
        .or_else(|| payload.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FetchError::Protocol("session response without sessionId".to_string()))
}

/// Reads a command response, returning its `value`
async fn read_value(response: reqwest::Response) -> Result<Value, FetchError> {
    let status = response.status();
    let payload: Value = response
        .json()
        .await
        .map_err(|e| FetchError::Protocol(e.to_string()))?;

    if !status.is_success() {
        return Err(FetchError::Protocol(error_message(&payload)));
    }

    Ok(payload.get("value").cloned().unwrap_or(Value::Null))
}

fn error_message(payload: &Value) -> String {
    let error = payload
        .pointer("/value/error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = payload
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or("");
    format!("{}: {}", error, message)
}

use crate::model::{dates, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw page of platform results
///
/// Immutable once persisted. `url` is the request URL with credentials left
/// as placeholders, so stored records never carry API secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub name: String,
    pub url: String,
    pub query: String,
    pub source: String,
    pub platform: Platform,

    /// Page number within its endpoint, starting at 1
    pub page: u32,

    /// Decoded platform payload
    pub content: serde_json::Value,

    #[serde(with = "dates::datetime")]
    pub fetched_at: DateTime<Utc>,
}

impl Response {
    /// Base for allocating Response names under `query`
    pub fn name_base(query: &str) -> String {
        format!("{}_response", query)
    }

    /// Returns the result items on this page, if the payload has a list
    pub fn items(&self) -> &[serde_json::Value] {
        self.platform.items(&self.content)
    }
}

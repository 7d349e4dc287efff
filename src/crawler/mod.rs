//! Crawler module for platform search and document collection
//!
//! This module contains the crawl orchestration core, including:
//! - The Fetcher contract with direct-HTTP and remote-browser backends
//! - Pacing, retry and challenge handling around every request
//! - WordPress and web-search pagination engines
//! - The WordPress capability probe
//! - The worker pool and per-query orchestration

mod coordinator;
mod fetcher;
mod guard;
pub mod pagination;
mod probe;
mod scheduler;
mod webdriver;

pub use coordinator::{Coordinator, CrawlSummary, ImportSummary};
pub use fetcher::{build_fetcher, build_http_client, Backend, Fetcher, HttpBackend, Page, Payload};
pub use guard::{decode_json, SessionGuard};
pub use probe::{api_root, probe_wordpress};
pub use scheduler::QueryQueue;
pub use webdriver::WebDriverBackend;

use thiserror::Error;

/// Errors raised inside a fetch backend
///
/// These never cross the [`Fetcher`] contract: the guard logs them and
/// reports "no content" instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out waiting for a browser session slot")]
    SessionTimeout,

    #[error("Session is closed")]
    Closed,
}

impl FetchError {
    /// Returns true for failures worth retrying
    ///
    /// Only transport-level failures qualify: connection errors, rate
    /// limiting and server errors. Decode failures and client errors are
    /// real answers.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(code) => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

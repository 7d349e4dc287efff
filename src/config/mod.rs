//! Configuration module for Corpus-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use corpus_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("corpus.toml")).unwrap();
//! println!("Crawling with {} worker(s)", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackendKind, Config, CrawlerConfig, ExtractorConfig, FetcherConfig, FilterConfig,
    OutputConfig, QueryEntry, SearchApiConfig, SourceEntry, WordpressConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

//! URL handling module for Corpus-Ripple
//!
//! This module provides scheme normalization, base-URL helpers for building
//! platform API URLs, and the URL-substring stoplist.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{base_url, site_prefix};
pub use matcher::matching_stopword;
pub use normalize::normalize_url;

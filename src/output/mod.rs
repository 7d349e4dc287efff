//! Output module for corpus reports
//!
//! This module handles:
//! - Loading and printing corpus statistics
//! - Exporting collected Articles as JSON and HTML files

mod export;
pub mod stats;

pub use export::{export_article, export_articles};
pub use stats::{load_statistics, print_statistics, CorpusStatistics, QueryProgress};

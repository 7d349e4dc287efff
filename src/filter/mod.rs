//! Dedup and filter layer shared by both pagination engines
//!
//! - `dedup`: the per-query URL-stop set, seeded from storage before a pass
//!   and shared across workers
//! - `dates`: lenient publication-date parsing and the inclusive range check

mod dates;
mod dedup;

pub use dates::{in_range, parse_date, parse_date_in_range, snippet_date};
pub use dedup::{DedupSet, QueryStops};

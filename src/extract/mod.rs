//! Heuristic HTML to plain-text extraction
//!
//! This module turns arbitrary article HTML into usable plain text:
//! - Structurally irrelevant subtrees (scripts, navigation, headers, footers,
//!   images, captions) are removed
//! - Candidate tags are tried in order; the first tag whose long-enough
//!   elements yield any text wins, and tags are never merged
//! - The result is entity-decoded, transliterated to ASCII and stripped of
//!   leftover markup and bare URLs

mod html;
mod normalize;

pub use html::{extract, extract_content, extract_title, stub, Extracted, PRUNED_TAGS};
pub use normalize::{clean_title, normalize_text};

//! Statistics generation from the corpus database
//!
//! This module provides functionality for extracting and displaying
//! corpus statistics from the storage layer.

use crate::model::{Entity, EntityKind};
use crate::storage::{RunRecord, Storage};
use crate::CorpusError;
use std::collections::BTreeMap;

/// Progress of one Query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProgress {
    pub name: String,
    pub collected: u32,
    pub complete: bool,
    pub enabled: bool,
}

/// Corpus statistics summary
#[derive(Debug, Clone)]
pub struct CorpusStatistics {
    /// Count of stored records by kind
    pub totals: BTreeMap<EntityKind, u64>,

    /// Per-query progress, ordered by name
    pub queries: Vec<QueryProgress>,

    /// Articles whose text contains the query term verbatim
    pub exact_matches: u64,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl CorpusStatistics {
    pub fn total(&self, kind: EntityKind) -> u64 {
        self.totals.get(&kind).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CorpusStatistics)` - Successfully loaded statistics
/// * `Err(CorpusError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CorpusStatistics, CorpusError> {
    let mut totals = BTreeMap::new();
    for kind in EntityKind::ALL {
        totals.insert(kind, storage.count(kind)?);
    }

    let mut queries: Vec<QueryProgress> = storage
        .list(EntityKind::Query)?
        .into_iter()
        .filter_map(|entity| match entity {
            Entity::Query(q) => Some(QueryProgress {
                name: q.name,
                collected: q.collected,
                complete: q.complete,
                enabled: q.enabled,
            }),
            _ => None,
        })
        .collect();
    queries.sort_by(|a, b| a.name.cmp(&b.name));

    let exact_matches = storage
        .list(EntityKind::Article)?
        .iter()
        .filter(|entity| matches!(entity, Entity::Article(a) if a.exact_match))
        .count() as u64;

    let latest_run = storage.get_latest_run()?;

    Ok(CorpusStatistics {
        totals,
        queries,
        exact_matches,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CorpusStatistics) {
    println!("=== Corpus Statistics ===\n");

    println!("Records:");
    for (kind, count) in &stats.totals {
        println!("  {}: {}", kind, count);
    }
    println!();

    let articles = stats.total(EntityKind::Article);
    let exact_rate = if articles > 0 {
        (stats.exact_matches as f64 / articles as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Exact matches: {} / {} articles ({:.1}%)",
        stats.exact_matches, articles, exact_rate
    );
    println!();

    if !stats.queries.is_empty() {
        println!("Queries:");
        for query in &stats.queries {
            let state = if !query.enabled {
                "disabled"
            } else if query.complete {
                "complete"
            } else {
                "pending"
            };
            println!("  {}: {} collected ({})", query.name, query.collected, state);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run #{}:", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            if let Some(duration) = run.duration() {
                println!("  Duration: {}s", duration.num_seconds());
            }
            println!("  Status: {}", run.status);
        }
        None => println!("No crawl runs recorded"),
    }
}

//! Corpus-Ripple main entry point
//!
//! This is the command-line interface for the Corpus-Ripple corpus builder.

use anyhow::Context;
use clap::Parser;
use corpus_ripple::config::{load_config_with_hash, Config};
use corpus_ripple::crawler::Coordinator;
use corpus_ripple::output::{export_articles, load_statistics, print_statistics};
use corpus_ripple::storage::open_storage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Corpus-Ripple: A polite corpus builder
///
/// Corpus-Ripple searches WordPress sites and a web-search API for documents
/// matching configured terms and date ranges, extracts their text, and keeps
/// everything in a local database. Re-running resumes where the last run
/// stopped.
#[derive(Parser, Debug)]
#[command(name = "corpus-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A polite corpus builder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["probe", "stats", "export"])]
    dry_run: bool,

    /// Import the config and probe every source for WordPress search, then exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export"])]
    probe: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "probe", "export"])]
    stats: bool,

    /// Export collected articles as JSON and HTML files and exit
    #[arg(long, conflicts_with_all = ["dry_run", "probe", "stats"])]
    export: bool,

    /// Crawl queries again even if their last pass found nothing new
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(&config)?;
    } else if cli.probe {
        handle_probe(config).await?;
    } else {
        handle_crawl(config, config_hash, cli.force).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("corpus_ripple=info,warn"),
            1 => EnvFilter::new("corpus_ripple=debug,info"),
            2 => EnvFilter::new("corpus_ripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Corpus-Ripple Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Backend: {:?}", config.fetcher.backend);
    println!(
        "  Sleep between fetches: {}-{}ms",
        config.crawler.min_sleep_ms, config.crawler.max_sleep_ms
    );
    match config.crawler.wordpress_page_limit() {
        Some(limit) => println!("  WordPress page limit: {}", limit),
        None => println!("  WordPress page limit: none"),
    }
    println!(
        "  Search API: {}",
        if config.search_api.is_configured() {
            "configured"
        } else {
            "not configured"
        }
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Export: {}", config.output.export_path);

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!("  - {} ({})", source.name, source.webpage);
    }

    let query_count: usize = config.queries.iter().map(|q| q.terms.len()).sum();
    println!("\nQueries ({}):", query_count);
    for entry in &config.queries {
        for term in &entry.terms {
            println!(
                "  - {} '{}' {}..{}{}",
                entry.source,
                term,
                entry.start_date,
                entry.end_date,
                if entry.enabled { "" } else { " (disabled)" }
            );
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes every Article to the export directory
fn handle_export(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Articles ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.export_path);
    println!();

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let exported = export_articles(&storage, Path::new(&config.output.export_path))?;

    println!("✓ Exported {} articles to: {}", exported, config.output.export_path);

    Ok(())
}

/// Handles the --probe mode: re-probes every configured source
async fn handle_probe(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::open(config)?;
    coordinator.import_config()?;

    let capable = coordinator
        .probe_sources(true)
        .await
        .context("probe failed")?;
    println!(
        "✓ {} of {} sources support WordPress search",
        capable,
        coordinator.config().sources.len()
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, force: bool) -> anyhow::Result<()> {
    let coordinator = Coordinator::open(config)?
        .with_config_hash(config_hash)
        .with_force(force);

    let imported = coordinator.import_config()?;
    tracing::info!(
        "Imported {} sources and {} queries ({} updated)",
        imported.sources_created,
        imported.queries_created,
        imported.queries_updated
    );

    if coordinator.config().crawler.probe_sources {
        match coordinator.probe_sources(false).await {
            Ok(capable) => tracing::info!("{} newly probed sources support WordPress", capable),
            Err(e) => tracing::warn!("Probing skipped: {}", e),
        }
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            on_signal.cancel();
        }
    });

    let summary = coordinator.run(cancel).await.context("crawl failed")?;

    if summary.interrupted {
        tracing::info!("Crawl interrupted; the next run resumes where this one stopped");
    } else {
        tracing::info!("Crawl completed successfully");
    }

    Ok(())
}

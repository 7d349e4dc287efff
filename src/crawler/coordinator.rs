//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the pieces together:
//! - Importing configured Sources and Queries into storage
//! - Probing Sources for the WordPress search endpoint
//! - Running a pool of workers, each with its own fetch session
//! - Per Query: choosing a pagination engine, filtering and deduplicating
//!   items, extracting content and persisting Responses and Articles
//! - Cooperative cancellation between pages

use crate::config::Config;
use crate::crawler::fetcher::{build_fetcher, Fetcher};
use crate::crawler::pagination::{Paginator, RawPage, SearchApiPages, WordpressPages};
use crate::crawler::probe::probe_wordpress;
use crate::crawler::scheduler::QueryQueue;
use crate::extract::{clean_title, extract_content, extract_title};
use crate::filter::{parse_date_in_range, snippet_date, DedupSet, QueryStops};
use crate::model::{
    contains_term, word_count, Article, Entity, EntityKind, NameAllocator, Platform, Query,
    Response, Source,
};
use crate::storage::{RunStatus, SqliteStorage, Storage, StorageError, StorageResult};
use crate::url::matching_stopword;
use crate::CorpusError;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of importing the configuration into storage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub sources_created: usize,
    pub queries_created: usize,
    pub queries_updated: usize,
}

/// Outcome of a crawl
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Queries whose pagination ran to the end
    pub queries_processed: usize,

    /// Queries left out because they were disabled or already complete
    pub queries_skipped: usize,

    /// Queries that stopped on a storage error
    pub queries_failed: usize,

    pub responses: usize,
    pub articles: usize,

    /// Workers that could not start a fetch session
    pub workers_failed: usize,

    /// Cancellation was requested before the crawl finished
    pub interrupted: bool,
}

impl CrawlSummary {
    fn merge(&mut self, other: CrawlSummary) {
        self.queries_processed += other.queries_processed;
        self.queries_skipped += other.queries_skipped;
        self.queries_failed += other.queries_failed;
        self.responses += other.responses;
        self.articles += other.articles;
        self.workers_failed += other.workers_failed;
        self.interrupted |= other.interrupted;
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    dedup: DedupSet,
    config_hash: String,
    force: bool,
}

impl Coordinator {
    /// Creates a new coordinator over an opened storage
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `storage` - The persistence collaborator
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            dedup: DedupSet::new(),
            config_hash: String::new(),
            force: false,
        }
    }

    /// Creates a coordinator using the database named in the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CorpusError)` - Failed to open the database
    pub fn open(config: Config) -> Result<Self, CorpusError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Ok(Self::new(config, storage))
    }

    /// Records the configuration hash on every run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Crawls complete Queries again instead of skipping them
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the storage
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        self.storage.clone()
    }

    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        locked(&self.storage, f)
    }

    /// Names of every Query the configuration describes, in config order
    pub fn config_query_names(&self) -> Vec<String> {
        self.config
            .queries
            .iter()
            .flat_map(|entry| {
                entry.terms.iter().map(move |term| {
                    Query::derive_name(&entry.source, term, entry.start_date, entry.end_date)
                })
            })
            .collect()
    }

    /// Creates configured Sources and Queries that are not stored yet
    ///
    /// Existing Sources are left alone: after import they change only
    /// through probe results and Query back-references. Existing Queries
    /// keep their progress and only pick up the configured `enabled` flag.
    pub fn import_config(&self) -> Result<ImportSummary, CorpusError> {
        let config = &self.config;
        let mut summary = ImportSummary::default();
        let mut storage = self.storage.lock().unwrap_or_else(|p| p.into_inner());

        for entry in &config.sources {
            if !storage.exists(EntityKind::Source, &entry.name)? {
                storage.save(&Entity::from(Source::from_entry(entry)))?;
                tracing::info!("Imported source '{}'", entry.name);
                summary.sources_created += 1;
            }
        }

        for entry in &config.queries {
            let mut source = storage.load_source(&entry.source)?;
            let mut source_changed = false;

            for term in &entry.terms {
                let fresh = Query::new(&entry.source, term, entry.start_date, entry.end_date)?;
                match storage.load_query(&fresh.name) {
                    Ok(mut existing) => {
                        if existing.enabled != entry.enabled {
                            existing.enabled = entry.enabled;
                            storage.save(&Entity::from(existing))?;
                            summary.queries_updated += 1;
                        }
                    }
                    Err(StorageError::NotFound { .. }) => {
                        let mut query = fresh.clone();
                        query.enabled = entry.enabled;
                        storage.save(&Entity::from(query))?;
                        tracing::info!("Imported query '{}'", fresh.name);
                        summary.queries_created += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
                source_changed |= source.add_query(&fresh.name);
            }

            if source_changed {
                storage.save(&Entity::from(source))?;
            }
        }

        Ok(summary)
    }

    /// Probes configured Sources for the WordPress search endpoint
    ///
    /// With `all` unset only Sources whose capability is still unknown are
    /// probed. A failed probe marks the Source as not capable.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of probed Sources found capable
    /// * `Err(CorpusError)` - The fetch session could not start, or storage failed
    pub async fn probe_sources(&self, all: bool) -> Result<usize, CorpusError> {
        let candidates: Vec<Source> = self.with_storage(|storage| {
            let mut sources = Vec::new();
            for entry in &self.config.sources {
                let source = storage.load_source(&entry.name)?;
                if all || source.needs_probe() {
                    sources.push(source);
                }
            }
            Ok(sources)
        })?;

        if candidates.is_empty() {
            return Ok(0);
        }

        let mut fetcher = build_fetcher(&self.config).await?;
        let result = self.probe_each(fetcher.as_mut(), candidates).await;
        fetcher.close().await;
        result
    }

    async fn probe_each(
        &self,
        fetcher: &mut dyn Fetcher,
        candidates: Vec<Source>,
    ) -> Result<usize, CorpusError> {
        let mut capable = 0;
        for mut source in candidates {
            let endpoint =
                probe_wordpress(fetcher, &source.webpage, &self.config.wordpress.endpoints).await;
            if endpoint.is_some() {
                capable += 1;
            }
            source.record_probe(endpoint, Utc::now());
            self.with_storage(|storage| storage.save(&Entity::from(source)))?;
        }
        Ok(capable)
    }

    /// Runnable Queries from the configuration, plus the number skipped
    fn pending_queries(&self) -> Result<(Vec<Query>, usize), CorpusError> {
        let storage = self.storage.lock().unwrap_or_else(|p| p.into_inner());
        let mut runnable = Vec::new();
        let mut skipped = 0;

        for name in self.config_query_names() {
            let query = match storage.load_query(&name) {
                Ok(query) => query,
                Err(StorageError::NotFound { .. }) => {
                    return Err(CorpusError::MissingEntity {
                        kind: EntityKind::Query,
                        name,
                    });
                }
                Err(e) => return Err(e.into()),
            };

            if query.is_runnable(self.force) {
                runnable.push(query);
            } else {
                tracing::info!(
                    "Skipping query '{}' ({})",
                    name,
                    if query.enabled { "complete" } else { "disabled" }
                );
                skipped += 1;
            }
        }

        Ok((runnable, skipped))
    }

    /// Runs one crawl pass over every runnable Query
    ///
    /// Queries are shared out to `crawler.workers` workers, each driving its
    /// own fetch session. A worker that cannot start a session logs the error
    /// and stops; the others carry on. Cancellation is honoured between
    /// pages, so an in-flight request always finishes.
    pub async fn run(&self, cancel: CancellationToken) -> Result<CrawlSummary, CorpusError> {
        let run_id = self.with_storage(|s| s.create_run(&self.config_hash))?;
        tracing::info!("Starting crawl run {}", run_id);

        let (queries, skipped) = match self.pending_queries() {
            Ok(pending) => pending,
            Err(e) => {
                self.with_storage(|s| s.finish_run(run_id, RunStatus::Failed))?;
                return Err(e);
            }
        };

        let queue = QueryQueue::new(queries);
        let workers = (self.config.crawler.workers as usize).min(queue.len());
        tracing::info!("{} queries to crawl with {} worker(s)", queue.len(), workers);

        let mut set = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                id,
                config: self.config.clone(),
                storage: self.storage.clone(),
                dedup: self.dedup.clone(),
            };
            let queue = queue.clone();
            let cancel = cancel.clone();
            set.spawn(async move { worker.run(queue, cancel).await });
        }

        let mut summary = CrawlSummary {
            queries_skipped: skipped,
            ..CrawlSummary::default()
        };

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(worker_summary)) => summary.merge(worker_summary),
                Ok(Err(e)) => {
                    tracing::error!("Worker stopped: {}", e);
                    summary.workers_failed += 1;
                }
                Err(e) => {
                    tracing::error!("{}", CorpusError::Worker(e.to_string()));
                    summary.workers_failed += 1;
                }
            }
        }

        summary.interrupted |= cancel.is_cancelled();
        let status = if summary.interrupted {
            RunStatus::Interrupted
        } else if workers > 0 && summary.workers_failed == workers {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.with_storage(|s| s.finish_run(run_id, status))?;

        tracing::info!(
            "Run {} {}: {} queries processed, {} skipped, {} failed, {} responses, {} articles",
            run_id,
            status,
            summary.queries_processed,
            summary.queries_skipped,
            summary.queries_failed,
            summary.responses,
            summary.articles
        );

        Ok(summary)
    }
}

/// Locks the storage, recovering the guard if another worker panicked
fn locked<T>(
    storage: &Mutex<SqliteStorage>,
    f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
) -> StorageResult<T> {
    let mut guard = storage.lock().unwrap_or_else(|p| p.into_inner());
    f(&mut guard)
}

/// Result of one Query's crawl pass
#[derive(Debug, Default)]
struct QueryOutcome {
    responses: usize,
    articles: u32,
    interrupted: bool,
}

/// One member of the worker pool
#[derive(Clone)]
struct Worker {
    id: usize,
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    dedup: DedupSet,
}

impl Worker {
    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        locked(&self.storage, f)
    }

    async fn run(
        self,
        queue: QueryQueue,
        cancel: CancellationToken,
    ) -> Result<CrawlSummary, CorpusError> {
        let mut fetcher = build_fetcher(&self.config).await.map_err(|e| {
            tracing::error!("Worker {} could not start a fetch session: {}", self.id, e);
            CorpusError::Fetch(e)
        })?;

        let summary = self.drain(fetcher.as_mut(), &queue, &cancel).await;
        fetcher.close().await;

        tracing::debug!("Worker {} finished", self.id);
        Ok(summary)
    }

    async fn drain(
        &self,
        fetcher: &mut dyn Fetcher,
        queue: &QueryQueue,
        cancel: &CancellationToken,
    ) -> CrawlSummary {
        let mut summary = CrawlSummary::default();

        while !cancel.is_cancelled() {
            let Some(query) = queue.pop() else {
                break;
            };
            let name = query.name.clone();

            match self.process_query(fetcher, query, cancel).await {
                Ok(outcome) => {
                    summary.responses += outcome.responses;
                    summary.articles += outcome.articles as usize;
                    if outcome.interrupted {
                        summary.interrupted = true;
                    } else {
                        summary.queries_processed += 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Query '{}' failed: {}", name, e);
                    summary.queries_failed += 1;
                }
            }
        }

        summary
    }

    fn paginator(
        &self,
        source: &Source,
        query: &Query,
        stops: QueryStops,
    ) -> Option<Box<dyn Paginator>> {
        let stopwords = self.config.filter.url_stopwords.clone();

        if source.is_wordpress_capable() {
            Some(Box::new(WordpressPages::new(
                &source.wordpress_endpoint,
                &query.term,
                self.config.wordpress.endpoints.clone(),
                self.config.wordpress.page_size,
                self.config.crawler.wordpress_page_limit(),
                stops,
                stopwords,
            )))
        } else if self.config.search_api.is_configured() {
            Some(Box::new(SearchApiPages::new(
                &self.config.search_api,
                &source.webpage,
                &query.term,
                self.config.crawler.search_page_limit(),
                stops,
                stopwords,
            )))
        } else {
            None
        }
    }

    /// Crawls one Query to the end of its results
    async fn process_query(
        &self,
        fetcher: &mut dyn Fetcher,
        mut query: Query,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, CorpusError> {
        let stops = self.dedup.scope(&query.name);
        let (source, mut response_names, mut article_names) = self.with_storage(|storage| {
            let source = storage.load_source(&query.source)?;
            stops.seed(storage.collected_urls(&query.name)?);
            let responses = storage.names_for(&query.name, EntityKind::Response)?;
            let articles = storage.names_for(&query.name, EntityKind::Article)?;
            Ok((
                source,
                NameAllocator::with_taken(responses),
                NameAllocator::with_taken(articles),
            ))
        })?;

        tracing::info!("Crawling query '{}' ({} known URLs)", query.name, stops.len());
        let mut outcome = QueryOutcome::default();

        let Some(mut pages) = self.paginator(&source, &query, stops.clone()) else {
            tracing::warn!(
                "Source '{}' has no WordPress endpoint and no search API is configured",
                source.name
            );
            query.record_pass(0, Utc::now());
            self.with_storage(|s| s.save(&Entity::from(query)))?;
            return Ok(outcome);
        };

        let today = Utc::now().date_naive();

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping '{}'", query.name);
                outcome.interrupted = true;
                break;
            }

            let Some(page) = pages.next_page(fetcher).await else {
                break;
            };

            let response = self.response_for(&query, &page, &mut response_names);
            match self.with_storage(|s| s.save(&Entity::from(response.clone()))) {
                Ok(()) => outcome.responses += 1,
                Err(e @ (StorageError::ConstraintViolation(_) | StorageError::Immutable { .. })) => {
                    tracing::warn!(
                        "Response {} not stored ({}), dropping its {} items",
                        response.url,
                        e,
                        response.items().len()
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            for item in response.items() {
                let context = ItemContext {
                    query: &query,
                    response: &response,
                    stops: &stops,
                    today,
                };
                if self
                    .collect_item(fetcher, &context, item, &mut article_names)
                    .await?
                    .is_some()
                {
                    outcome.articles += 1;
                }
            }
        }

        let cursor = pages.cursor();
        tracing::info!(
            "Query '{}': {} pages ({} skipped), {} new articles",
            query.name,
            cursor.yielded,
            cursor.skipped,
            outcome.articles
        );

        if cursor.failed {
            tracing::warn!("Query '{}' hit fetch failures and stays pending", query.name);
        }

        if outcome.interrupted || cursor.failed {
            query.record_partial(outcome.articles, Utc::now());
        } else {
            query.record_pass(outcome.articles, Utc::now());
        }
        self.with_storage(|s| s.save(&Entity::from(query)))?;

        Ok(outcome)
    }

    fn response_for(&self, query: &Query, page: &RawPage, names: &mut NameAllocator) -> Response {
        Response {
            name: names.allocate(&Response::name_base(&query.name)),
            url: page.url.clone(),
            query: query.name.clone(),
            source: query.source.clone(),
            platform: page.platform,
            page: page.number,
            content: page.payload.clone(),
            fetched_at: Utc::now(),
        }
    }

    /// Filters one result item and turns it into a stored Article
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Article))` - A new Article was stored
    /// * `Ok(None)` - The item was filtered out or had no content
    /// * `Err(CorpusError)` - Storage failed
    async fn collect_item(
        &self,
        fetcher: &mut dyn Fetcher,
        ctx: &ItemContext<'_>,
        item: &Value,
        names: &mut NameAllocator,
    ) -> Result<Option<Article>, CorpusError> {
        let platform = ctx.response.platform;
        let Some(url) = item.get("link").and_then(Value::as_str).map(str::trim) else {
            tracing::debug!("Item without link in {}", ctx.response.name);
            return Ok(None);
        };

        if let Some(word) = matching_stopword(url, &self.config.filter.url_stopwords) {
            tracing::info!("Skipping {} (stopword '{}')", url, word);
            return Ok(None);
        }

        let raw_date = match platform {
            Platform::Wordpress => item.get("date").and_then(Value::as_str).unwrap_or(""),
            Platform::SearchApi => {
                snippet_date(item.get("snippet").and_then(Value::as_str).unwrap_or(""))
            }
        };
        let Some(pub_date) =
            parse_date_in_range(raw_date, ctx.query.start_date, ctx.query.end_date, ctx.today)
        else {
            tracing::info!("Skipping {} (no date or out of range)", url);
            return Ok(None);
        };

        if !ctx.stops.claim(url) {
            tracing::debug!("Skipping {} (already collected)", url);
            return Ok(None);
        }

        let (title, content_html) = match platform {
            Platform::Wordpress => {
                let html = item
                    .pointer("/content/rendered")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if html.trim().is_empty() {
                    tracing::info!("Skipping {} (no embedded content)", url);
                    ctx.stops.release(url);
                    return Ok(None);
                }
                let title = item
                    .pointer("/title/rendered")
                    .and_then(Value::as_str)
                    .map(clean_title)
                    .unwrap_or_default();
                (title, html.to_string())
            }
            Platform::SearchApi => {
                let Some(html) = fetcher.fetch_text(url).await else {
                    tracing::info!("Skipping {} (no content)", url);
                    ctx.stops.release(url);
                    return Ok(None);
                };
                let title = item
                    .get("title")
                    .and_then(Value::as_str)
                    .map(clean_title)
                    .filter(|t| !t.is_empty())
                    .or_else(|| extract_title(&html))
                    .unwrap_or_default();
                (title, html)
            }
        };

        let content = extract_content(&content_html, &self.config.extractor);
        let exact_match = contains_term(&content, &ctx.query.term);
        let article = Article {
            name: names.allocate(&Article::name_base(&ctx.query.name, exact_match)),
            url: url.to_string(),
            title,
            pub_date,
            length: word_count(&content),
            content_html,
            content,
            exact_match,
            query: ctx.query.name.clone(),
            source: ctx.query.source.clone(),
            response: ctx.response.name.clone(),
            platform,
            collected_at: Utc::now(),
        };

        match self.with_storage(|s| s.save(&Entity::from(article.clone()))) {
            Ok(()) => {
                tracing::info!("Collected {} as {}", article.url, article.name);
                Ok(Some(article))
            }
            Err(e @ StorageError::ConstraintViolation(_)) => {
                tracing::warn!("Article {} not stored: {}", article.url, e);
                Ok(None)
            }
            Err(e) => {
                ctx.stops.release(url);
                Err(e.into())
            }
        }
    }
}

/// Per-item view of the Query being crawled
struct ItemContext<'a> {
    query: &'a Query,
    response: &'a Response,
    stops: &'a QueryStops,
    today: NaiveDate,
}

use crate::config::types::{
    BackendKind, Config, CrawlerConfig, ExtractorConfig, FetcherConfig, OutputConfig, QueryEntry,
    SourceEntry, WordpressConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_extractor_config(&config.extractor)?;
    validate_wordpress_config(&config.wordpress)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    validate_queries(&config.queries, &config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 32 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 32, got {}",
            config.workers
        )));
    }

    if config.page_limit < -1 || config.search_page_limit < -1 {
        return Err(ConfigError::Validation(
            "page limits must be -1 (unlimited) or a non-negative page count".to_string(),
        ));
    }

    if config.min_sleep_ms > config.max_sleep_ms {
        return Err(ConfigError::Validation(format!(
            "min_sleep_ms ({}) must not exceed max_sleep_ms ({})",
            config.min_sleep_ms, config.max_sleep_ms
        )));
    }

    if config.retries > 10 {
        return Err(ConfigError::Validation(format!(
            "retries must be <= 10, got {}",
            config.retries
        )));
    }

    Ok(())
}

/// Validates fetch backend configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.backend == BackendKind::Webdriver {
        if config.hub_url.is_empty() {
            return Err(ConfigError::Validation(
                "hub_url is required for the webdriver backend".to_string(),
            ));
        }
        Url::parse(&config.hub_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid hub_url: {}", e)))?;
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config
        .challenge_markers
        .iter()
        .chain(&config.challenge_body_markers)
        .any(|m| m.is_empty())
    {
        return Err(ConfigError::Validation(
            "challenge markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates extractor configuration
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    if config.tags.is_empty() {
        return Err(ConfigError::Validation(
            "extractor tags cannot be empty".to_string(),
        ));
    }

    for tag in &config.tags {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::Validation(format!(
                "Invalid extractor tag name '{}'",
                tag
            )));
        }
    }

    Ok(())
}

/// Validates WordPress configuration
fn validate_wordpress_config(config: &WordpressConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "wordpress page_size must be >= 1".to_string(),
        ));
    }

    for endpoint in &config.endpoints {
        if endpoint.is_empty() || endpoint.contains('/') {
            return Err(ConfigError::Validation(format!(
                "Invalid wordpress endpoint '{}'",
                endpoint
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for source in sources {
        validate_name(&source.name)?;

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source name '{}'",
                source.name
            )));
        }

        crate::url::normalize_url(&source.webpage).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid webpage '{}': {}", source.webpage, e))
        })?;

        if !source.wordpress_endpoint.is_empty() {
            crate::url::normalize_url(&source.wordpress_endpoint).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Invalid wordpress_endpoint '{}': {}",
                    source.wordpress_endpoint, e
                ))
            })?;
        }
    }

    Ok(())
}

/// Validates query entries against the declared sources
fn validate_queries(queries: &[QueryEntry], sources: &[SourceEntry]) -> Result<(), ConfigError> {
    for query in queries {
        if !sources.iter().any(|s| s.name == query.source) {
            return Err(ConfigError::Validation(format!(
                "Query refers to unknown source '{}'",
                query.source
            )));
        }

        if query.terms.is_empty() || query.terms.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Query for '{}' must have non-empty terms",
                query.source
            )));
        }

        if query.end_date < query.start_date {
            return Err(ConfigError::InvalidDate(format!(
                "end_date {} is before start_date {} for '{}'",
                query.end_date, query.start_date, query.source
            )));
        }
    }

    Ok(())
}

/// Validates an entity name: non-empty, no path separators
fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if name.contains('/') || name.contains('\\') || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "source name '{}' cannot contain whitespace or path separators",
            name
        )));
    }

    Ok(())
}

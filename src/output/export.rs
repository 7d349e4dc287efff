//! JSON export of collected Articles
//!
//! Each Article is written as `{name}.json` next to its raw HTML in
//! `{name}.html`. The JSON carries the cleaned text and metadata and names
//! the HTML file instead of embedding it.

use crate::model::dates;
use crate::model::{Article, Entity, EntityKind};
use crate::storage::Storage;
use crate::CorpusError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One exported Article as written to `{name}.json`
#[derive(Debug, Serialize)]
struct ExportedArticle<'a> {
    name: &'a str,
    url: &'a str,
    title: &'a str,
    pub_date: String,
    content: &'a str,
    length: usize,
    exact_match: bool,
    query: &'a str,
    source: &'a str,
    response: &'a str,
    platform: &'static str,
    collected_at: String,
    html_file: String,
}

impl<'a> ExportedArticle<'a> {
    fn new(article: &'a Article, html_file: String) -> Self {
        Self {
            name: &article.name,
            url: &article.url,
            title: &article.title,
            pub_date: dates::format_date(article.pub_date),
            content: &article.content,
            length: article.length,
            exact_match: article.exact_match,
            query: &article.query,
            source: &article.source,
            response: &article.response,
            platform: article.platform.as_str(),
            collected_at: dates::format_datetime(&article.collected_at),
            html_file,
        }
    }
}

/// Writes one Article's JSON and HTML files into `dir`
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the JSON file written
/// * `Err(CorpusError)` - A file could not be written
pub fn export_article(article: &Article, dir: &Path) -> Result<PathBuf, CorpusError> {
    let html_file = format!("{}.html", article.name);
    fs::write(dir.join(&html_file), &article.content_html)?;

    let json_path = dir.join(format!("{}.json", article.name));
    let json = serde_json::to_string_pretty(&ExportedArticle::new(article, html_file))?;
    fs::write(&json_path, json)?;

    Ok(json_path)
}

/// Exports every stored Article into `dir`, creating it if needed
///
/// # Arguments
///
/// * `storage` - The storage backend to read Articles from
/// * `dir` - Target directory
///
/// # Returns
///
/// * `Ok(usize)` - Number of Articles exported
/// * `Err(CorpusError)` - Reading storage or writing files failed
pub fn export_articles(storage: &dyn Storage, dir: &Path) -> Result<usize, CorpusError> {
    fs::create_dir_all(dir)?;

    let mut exported = 0;
    for entity in storage.list(EntityKind::Article)? {
        if let Entity::Article(article) = entity {
            export_article(&article, dir)?;
            exported += 1;
        }
    }

    tracing::info!("Exported {} articles to {}", exported, dir.display());
    Ok(exported)
}

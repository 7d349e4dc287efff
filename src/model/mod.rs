//! Data model for Corpus-Ripple
//!
//! Four record kinds are persisted: Sources (sites), Queries (term plus date
//! range against one source), Responses (raw platform pages) and Articles
//! (extracted documents). Every record is addressed by `(kind, name)`.

pub mod dates;

mod article;
mod query;
mod response;
mod source;

pub use article::{contains_term, word_count, Article};
pub use query::Query;
pub use response::Response;
pub use source::Source;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Result platform a Response or Article came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Wordpress,
    SearchApi,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Wordpress => "wordpress",
            Platform::SearchApi => "search-api",
        }
    }

    /// Returns the result items in a payload from this platform
    ///
    /// WordPress pages are bare JSON arrays; web-search pages carry their
    /// results under `items`. Anything else has no items.
    pub fn items<'a>(&self, payload: &'a serde_json::Value) -> &'a [serde_json::Value] {
        let list = match self {
            Platform::Wordpress => payload.as_array(),
            Platform::SearchApi => payload.get("items").and_then(|v| v.as_array()),
        };
        list.map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Source,
    Query,
    Response,
    Article,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Source,
        EntityKind::Query,
        EntityKind::Response,
        EntityKind::Article,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Source => "source",
            EntityKind::Query => "query",
            EntityKind::Response => "response",
            EntityKind::Article => "article",
        }
    }

    /// Responses and Articles are append-only
    pub fn is_immutable(&self) -> bool {
        matches!(self, EntityKind::Response | EntityKind::Article)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(EntityKind::Source),
            "query" => Ok(EntityKind::Query),
            "response" => Ok(EntityKind::Response),
            "article" => Ok(EntityKind::Article),
            other => Err(format!("unknown entity kind '{}'", other)),
        }
    }
}

/// Any persisted record, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Source(Source),
    Query(Query),
    Response(Response),
    Article(Article),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Source(_) => EntityKind::Source,
            Entity::Query(_) => EntityKind::Query,
            Entity::Response(_) => EntityKind::Response,
            Entity::Article(_) => EntityKind::Article,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Source(s) => &s.name,
            Entity::Query(q) => &q.name,
            Entity::Response(r) => &r.name,
            Entity::Article(a) => &a.name,
        }
    }

    /// Owning Query name, for Responses and Articles
    pub fn query(&self) -> Option<&str> {
        match self {
            Entity::Response(r) => Some(&r.query),
            Entity::Article(a) => Some(&a.query),
            _ => None,
        }
    }

    /// Dedup URL, for Responses and Articles
    pub fn url(&self) -> Option<&str> {
        match self {
            Entity::Response(r) => Some(&r.url),
            Entity::Article(a) => Some(&a.url),
            _ => None,
        }
    }
}

impl From<Source> for Entity {
    fn from(v: Source) -> Self {
        Entity::Source(v)
    }
}

impl From<Query> for Entity {
    fn from(v: Query) -> Self {
        Entity::Query(v)
    }
}

impl From<Response> for Entity {
    fn from(v: Response) -> Self {
        Entity::Response(v)
    }
}

impl From<Article> for Entity {
    fn from(v: Article) -> Self {
        Entity::Article(v)
    }
}

/// Hands out collision-free record names
///
/// Names take the form `{base}_{n}` with the smallest `n >= 0` not yet taken.
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the allocator with names that already exist in storage
    pub fn with_taken<I: IntoIterator<Item = String>>(names: I) -> Self {
        Self {
            taken: names.into_iter().collect(),
        }
    }

    pub fn allocate(&mut self, base: &str) -> String {
        let mut index = 0usize;
        loop {
            let candidate = format!("{}_{}", base, index);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            index += 1;
        }
    }
}

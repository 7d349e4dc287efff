use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// URL-stop sets for every query, shared by all workers
///
/// Each query gets its own set of URLs that must not be collected again:
/// request URLs of stored Responses and URLs of stored Articles. The check
/// and the insert happen under one lock so two workers can never both
/// claim the same URL.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    inner: Arc<Mutex<HashMap<String, HashSet<String>>>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle scoped to one query
    pub fn scope(&self, query: &str) -> QueryStops {
        QueryStops {
            set: self.clone(),
            query: query.to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashSet<String>>> {
        // Every mutation is a single HashSet call, so poisoned data is still whole
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A [`DedupSet`] view restricted to one query
#[derive(Debug, Clone)]
pub struct QueryStops {
    set: DedupSet,
    query: String,
}

impl QueryStops {
    /// Adds previously collected URLs
    pub fn seed<I: IntoIterator<Item = String>>(&self, urls: I) {
        let mut map = self.set.lock();
        map.entry(self.query.clone()).or_default().extend(urls);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.set
            .lock()
            .get(&self.query)
            .map(|urls| urls.contains(url))
            .unwrap_or(false)
    }

    /// Adds a URL, returning true if it was not already present
    pub fn insert(&self, url: &str) -> bool {
        let mut map = self.set.lock();
        map.entry(self.query.clone())
            .or_default()
            .insert(url.to_string())
    }

    /// Atomically checks and reserves a URL for collection
    ///
    /// Returns false if the URL is already stopped. A claimed URL that
    /// could not be collected should be handed back with [`release`].
    ///
    /// [`release`]: QueryStops::release
    pub fn claim(&self, url: &str) -> bool {
        self.insert(url)
    }

    /// Returns a claimed URL so a later pass may try it again
    pub fn release(&self, url: &str) {
        let mut map = self.set.lock();
        if let Some(urls) = map.get_mut(&self.query) {
            urls.remove(url);
        }
    }

    pub fn len(&self) -> usize {
        self.set.lock().get(&self.query).map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_are_independent() {
        let set = DedupSet::new();
        let a = set.scope("a");
        let b = set.scope("b");

        assert!(a.claim("https://example.com/1"));
        assert!(!a.claim("https://example.com/1"));
        assert!(b.claim("https://example.com/1"));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_seed_and_release() {
        let stops = DedupSet::new().scope("q");
        assert!(stops.is_empty());

        stops.seed(vec!["u1".to_string(), "u2".to_string()]);
        assert!(stops.contains("u1"));
        assert!(!stops.claim("u2"));

        assert!(stops.claim("u3"));
        stops.release("u3");
        assert!(!stops.contains("u3"));
        assert!(stops.claim("u3"));
    }

    #[test]
    fn test_claim_is_at_most_once_across_threads() {
        let set = DedupSet::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stops = set.scope("q");
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| stops.claim(&format!("https://example.com/{}", i)))
                        .count()
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100);
    }
}

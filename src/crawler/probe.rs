//! WordPress capability probe
//!
//! A Source is WordPress-capable when `{site}/wp-json/wp/v2` declares the
//! `wp/v2` namespace and every configured document route accepts GET with a
//! `search` argument. Any failure along the way means "not capable".

use crate::crawler::fetcher::Fetcher;
use crate::url::base_url;
use serde_json::Value;

/// REST namespace of the WordPress core API
pub const WP_NAMESPACE: &str = "wp/v2";

/// Returns the REST root probed for a site
pub fn api_root(site: &str) -> String {
    format!("{}/wp-json/{}", base_url(site), WP_NAMESPACE)
}

/// Probes a site for the WordPress search endpoint
///
/// # Arguments
///
/// * `fetcher` - Fetcher to issue the probe request with
/// * `site` - Base site URL
/// * `endpoints` - Document routes that must support search
///
/// # Returns
///
/// * `Some(String)` - The REST root to search against
/// * `None` - The site is not WordPress-capable, or the probe failed
pub async fn probe_wordpress(
    fetcher: &mut dyn Fetcher,
    site: &str,
    endpoints: &[String],
) -> Option<String> {
    let root = api_root(site);
    let Some(index) = fetcher.fetch_json(&root).await else {
        tracing::info!("No WordPress API index at {}", root);
        return None;
    };

    if !declares_namespace(&index) {
        tracing::info!("{} does not declare namespace {}", root, WP_NAMESPACE);
        return None;
    }

    for endpoint in endpoints {
        if !route_supports_search(&index, endpoint) {
            tracing::info!("{} route '{}' has no GET search", root, endpoint);
            return None;
        }
    }

    tracing::info!("{} supports WordPress search", site);
    Some(root)
}

fn declares_namespace(index: &Value) -> bool {
    let single = index.get("namespace").and_then(Value::as_str) == Some(WP_NAMESPACE);
    let listed = index
        .get("namespaces")
        .and_then(Value::as_array)
        .map(|list| list.iter().any(|ns| ns.as_str() == Some(WP_NAMESPACE)))
        .unwrap_or(false);
    single || listed
}

fn route_supports_search(index: &Value, endpoint: &str) -> bool {
    let route = format!("/{}/{}", WP_NAMESPACE, endpoint);
    let Some(handlers) = index
        .get("routes")
        .and_then(|routes| routes.get(&route))
        .and_then(|r| r.get("endpoints"))
        .and_then(Value::as_array)
    else {
        return false;
    };

    handlers.iter().any(|handler| {
        let gets = handler
            .get("methods")
            .and_then(Value::as_array)
            .map(|methods| methods.iter().any(|m| m.as_str() == Some("GET")))
            .unwrap_or(false);
        let searches = handler
            .get("args")
            .and_then(Value::as_object)
            .map(|args| args.contains_key("search"))
            .unwrap_or(false);
        gets && searches
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::pagination::testing::CannedFetcher;
    use serde_json::json;

    fn index(search: bool) -> Value {
        let args = if search {
            json!({"search": {"type": "string"}, "page": {}})
        } else {
            json!({"page": {}})
        };
        json!({
            "namespace": "wp/v2",
            "routes": {
                "/wp/v2/posts": {"endpoints": [
                    {"methods": ["GET"], "args": args},
                    {"methods": ["POST"], "args": {}}
                ]},
                "/wp/v2/pages": {"endpoints": [
                    {"methods": ["GET"], "args": {"search": {}}}
                ]}
            }
        })
    }

    fn endpoints() -> Vec<String> {
        vec!["posts".to_string(), "pages".to_string()]
    }

    #[tokio::test]
    async fn test_capable_site() {
        let mut fetcher = CannedFetcher::default()
            .with("https://example.com/wp-json/wp/v2", index(true));
        let root = probe_wordpress(&mut fetcher, "https://example.com/", &endpoints()).await;
        assert_eq!(root.as_deref(), Some("https://example.com/wp-json/wp/v2"));
    }

    #[tokio::test]
    async fn test_route_without_search() {
        let mut fetcher = CannedFetcher::default()
            .with("https://example.com/wp-json/wp/v2", index(false));
        assert!(probe_wordpress(&mut fetcher, "https://example.com", &endpoints())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_wrong_namespace_or_missing_index() {
        let mut fetcher = CannedFetcher::default()
            .with("https://example.com/wp-json/wp/v2", json!({"namespace": "other/v1"}));
        assert!(probe_wordpress(&mut fetcher, "https://example.com", &endpoints())
            .await
            .is_none());

        let mut fetcher = CannedFetcher::default();
        assert!(probe_wordpress(&mut fetcher, "https://example.org", &endpoints())
            .await
            .is_none());
    }

    #[test]
    fn test_namespaces_list() {
        assert!(declares_namespace(&json!({"namespaces": ["oembed/1.0", "wp/v2"]})));
        assert!(!declares_namespace(&json!({"namespaces": []})));
    }
}

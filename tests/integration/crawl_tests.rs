//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for WordPress sites and the
//! web-search API, and run the full import, probe and crawl cycle against
//! an on-disk database through the direct-HTTP backend.

use corpus_ripple::config::{parse_config, Config};
use corpus_ripple::crawler::{Coordinator, CrawlSummary};
use corpus_ripple::model::{Entity, EntityKind};
use corpus_ripple::storage::{RunStatus, Storage};
use serde_json::{json, Value};
use std::collections::HashSet;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY: &str = "example_arts_2019-01-01_2019-12-31";

/// Creates a test configuration against the mock site
///
/// `source_extra` is appended to the `[[source]]` table and `extra` to the
/// end of the file.
fn create_test_config(db_path: &str, site: &str, source_extra: &str, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[crawler]
min-sleep-ms = 0
max-sleep-ms = 0
retries = 0
probe-sources = false

[wordpress]
endpoints = ["posts"]
page-size = 10

[output]
database-path = "{db_path}"

[[source]]
name = "example"
webpage = "{site}"
{source_extra}

[[query]]
source = "example"
terms = ["arts"]
start-date = "2019-01-01"
end-date = "2019-12-31"

{extra}
"#
    ))
    .expect("test config should parse")
}

fn wordpress_config(db: &TempDir, server: &MockServer) -> Config {
    create_test_config(
        &db.path().join("corpus.db").display().to_string(),
        &server.uri(),
        &format!("wordpress-endpoint = \"{}/wp-json/wp/v2\"", server.uri()),
        "",
    )
}

fn search_config(db: &TempDir, server: &MockServer) -> Config {
    create_test_config(
        &db.path().join("corpus.db").display().to_string(),
        &server.uri(),
        "",
        &format!(
            "[search-api]\nendpoint = \"{}/customsearch/v1\"\ncx = \"engine\"\nkey = \"secret\"\n",
            server.uri()
        ),
    )
}

fn post(site: &str, id: usize, date: &str) -> Value {
    json!({
        "id": id,
        "link": format!("{}/{}/post-{}", site, "2019", id),
        "date": date,
        "title": {"rendered": format!("Post &#8211; {}", id)},
        "content": {"rendered": format!(
            "<p>Funding for the arts grew again this year, post {} reports, \
             with several regional councils announcing new grants.</p>",
            id
        )}
    })
}

fn posts(site: &str, ids: std::ops::Range<usize>) -> Value {
    Value::Array(ids.map(|id| post(site, id, "2019-03-01T10:00:00")).collect())
}

async fn mount_wp_page(server: &MockServer, page: &str, body: Value, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("search", "arts"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn crawl(coordinator: &Coordinator) -> CrawlSummary {
    coordinator.import_config().expect("import should succeed");
    coordinator
        .run(CancellationToken::new())
        .await
        .expect("crawl should succeed")
}

fn entities(coordinator: &Coordinator, kind: EntityKind) -> Vec<Entity> {
    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    storage.list_for_query(QUERY, kind).unwrap()
}

#[tokio::test]
async fn test_wordpress_short_page_ends_pagination() {
    let server = MockServer::start().await;
    let site = server.uri();
    mount_wp_page(&server, "1", posts(&site, 0..10), 1).await;
    mount_wp_page(&server, "2", posts(&site, 10..13), 1).await;
    mount_wp_page(&server, "3", json!([]), 0).await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(wordpress_config(&db, &server)).unwrap();
    let summary = crawl(&coordinator).await;

    assert_eq!(summary.queries_processed, 1);
    assert_eq!(summary.responses, 2);
    assert_eq!(summary.articles, 13);

    let articles = entities(&coordinator, EntityKind::Article);
    assert_eq!(articles.len(), 13);
    let Entity::Article(first) = &articles[0] else {
        panic!("expected an article");
    };
    assert!(first.name.starts_with(QUERY));
    assert!(first.exact_match);
    assert!(first.content.starts_with("Funding for the arts grew again"));
    assert!(first.title.starts_with("Post - "));
    assert_eq!(first.pub_date.to_string(), "2019-03-01");

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let query = storage.load_query(QUERY).unwrap();
    assert_eq!(query.collected, 13);
    assert!(!query.complete);
}

#[tokio::test]
async fn test_rerun_collects_nothing_twice() {
    let server = MockServer::start().await;
    let site = server.uri();
    mount_wp_page(&server, "1", posts(&site, 0..10), 1).await;
    mount_wp_page(&server, "2", posts(&site, 10..13), 1).await;

    // WordPress answers 400 past the last page
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "rest_post_invalid_page_number"
        })))
        .mount(&server)
        .await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(wordpress_config(&db, &server)).unwrap();

    let first = crawl(&coordinator).await;
    assert_eq!(first.articles, 13);

    let second = crawl(&coordinator).await;
    assert_eq!(second.articles, 0);
    assert_eq!(second.responses, 0);

    let articles = entities(&coordinator, EntityKind::Article);
    assert_eq!(articles.len(), 13);
    let urls: HashSet<_> = articles.iter().filter_map(|a| a.url()).collect();
    assert_eq!(urls.len(), 13);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let query = storage.load_query(QUERY).unwrap();
    assert_eq!(query.collected, 13);
    assert!(query.complete);
    assert_eq!(
        storage.get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_items_outside_date_range_are_skipped() {
    let server = MockServer::start().await;
    let site = server.uri();
    let page = json!([
        post(&site, 1, "2019-06-15T08:30:00"),
        post(&site, 2, "2018-12-31T23:59:59"),
        post(&site, 3, "not a date"),
        post(&site, 4, "2019-12-31T00:00:00"),
    ]);
    mount_wp_page(&server, "1", page, 1).await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(wordpress_config(&db, &server)).unwrap();
    let summary = crawl(&coordinator).await;

    assert_eq!(summary.articles, 2);
    let mut urls: Vec<String> = entities(&coordinator, EntityKind::Article)
        .iter()
        .filter_map(|a| a.url().map(str::to_string))
        .collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![format!("{}/2019/post-1", site), format!("{}/2019/post-4", site)]
    );
}

#[tokio::test]
async fn test_search_api_without_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("cx", "engine"))
        .and(query_param("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": {"request": [{"totalResults": "0"}]},
            "searchInformation": {"totalResults": "0"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(search_config(&db, &server)).unwrap();
    let summary = crawl(&coordinator).await;

    assert_eq!(summary.queries_processed, 1);
    assert_eq!(summary.articles, 0);
    assert!(entities(&coordinator, EntityKind::Response).is_empty());

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let query = storage.load_query(QUERY).unwrap();
    assert_eq!(query.collected, 0);
    assert!(query.complete);
    assert!(query.last_run.is_some());
}

#[tokio::test]
async fn test_search_api_fetches_article_pages() {
    let server = MockServer::start().await;
    let site = server.uri();

    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": {"request": [{"startIndex": 1}]},
            "items": [
                {
                    "link": format!("{}/news/arts-grant", site),
                    "title": "Arts grant announced",
                    "snippet": "Mar 4, 2019 ... The council announced an arts grant"
                },
                {
                    "link": format!("{}/news/missing", site),
                    "title": "Missing page",
                    "snippet": "Mar 5, 2019 ... gone"
                },
                {
                    "link": format!("{}/news/old", site),
                    "title": "Old news",
                    "snippet": "Mar 5, 2015 ... too old"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/news/arts-grant"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Ignored</title></head><body>\
             <nav>Home | News | About</nav>\
             <p>The regional council announced a new grant for the Arts on Monday, \
             aimed at small theatre companies and touring musicians.</p>\
             </body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/news/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/news/old"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>old</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(search_config(&db, &server)).unwrap();
    let summary = crawl(&coordinator).await;

    assert_eq!(summary.responses, 1);
    assert_eq!(summary.articles, 1);

    let responses = entities(&coordinator, EntityKind::Response);
    let Entity::Response(response) = &responses[0] else {
        panic!("expected a response");
    };
    assert!(response.url.contains("key={key}"));
    assert!(!response.url.contains("secret"));

    let articles = entities(&coordinator, EntityKind::Article);
    let Entity::Article(article) = &articles[0] else {
        panic!("expected an article");
    };
    assert_eq!(article.title, "Arts grant announced");
    assert_eq!(article.pub_date.to_string(), "2019-03-04");
    assert!(article.content.starts_with("The regional council"));
    assert!(!article.content.contains("Home | News"));
    // Term matching is case-sensitive: only "Arts" appears
    assert!(!article.exact_match);
    assert_eq!(
        article.name,
        format!("{}_no-exact-match_0", QUERY)
    );
    assert_eq!(article.response, response.name);
}

#[tokio::test]
async fn test_probe_discovers_wordpress_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "namespace": "wp/v2",
            "routes": {
                "/wp/v2/posts": {"endpoints": [
                    {"methods": ["GET"], "args": {"search": {}, "page": {}}}
                ]}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = TempDir::new().unwrap();
    let config = create_test_config(
        &db.path().join("corpus.db").display().to_string(),
        &server.uri(),
        "",
        "",
    );
    let coordinator = Coordinator::open(config).unwrap();
    coordinator.import_config().unwrap();

    assert_eq!(coordinator.probe_sources(false).await.unwrap(), 1);
    // Already probed, so nothing is left to probe
    assert_eq!(coordinator.probe_sources(false).await.unwrap(), 0);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let source = storage.load_source("example").unwrap();
    assert_eq!(
        source.wordpress_endpoint,
        format!("{}/wp-json/wp/v2", server.uri())
    );
    assert!(source.probed_at.is_some());
    assert!(source.queries.contains(QUERY));
    assert_eq!(storage.count(EntityKind::Source).unwrap(), 1);
}

#[tokio::test]
async fn test_outage_leaves_query_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(wordpress_config(&db, &server)).unwrap();

    let first = crawl(&coordinator).await;
    assert_eq!(first.queries_processed, 1);
    assert_eq!(first.articles, 0);
    {
        let storage = coordinator.storage();
        let storage = storage.lock().unwrap();
        let query = storage.load_query(QUERY).unwrap();
        assert!(!query.complete);
        assert!(query.last_run.is_some());
    }

    // The query is crawled again rather than skipped as finished
    let second = crawl(&coordinator).await;
    assert_eq!(second.queries_processed, 1);
    assert_eq!(second.queries_skipped, 0);
}

#[tokio::test]
async fn test_stopworded_item_links_are_not_stored() {
    let server = MockServer::start().await;
    let site = server.uri();
    let page = json!([
        post(&site, 1, "2019-03-01T10:00:00"),
        post(&site, 2, "2019-03-02T10:00:00"),
    ]);
    mount_wp_page(&server, "1", page, 1).await;

    let db = TempDir::new().unwrap();
    let config = create_test_config(
        &db.path().join("corpus.db").display().to_string(),
        &site,
        &format!("wordpress-endpoint = \"{}/wp-json/wp/v2\"", site),
        "[filter]\nurl-stopwords = [\"/post-2\"]\n",
    );
    let coordinator = Coordinator::open(config).unwrap();
    let summary = crawl(&coordinator).await;

    assert_eq!(summary.responses, 1);
    assert_eq!(summary.articles, 1);
    let urls: Vec<String> = entities(&coordinator, EntityKind::Article)
        .iter()
        .filter_map(|a| a.url().map(str::to_string))
        .collect();
    assert_eq!(urls, vec![format!("{}/2019/post-1", site)]);
}

#[tokio::test]
async fn test_empty_embedded_content_is_not_claimed() {
    let server = MockServer::start().await;
    let site = server.uri();

    let mut first_page = posts(&site, 0..10);
    first_page[9]["content"]["rendered"] = json!("  ");
    mount_wp_page(&server, "1", first_page, 1).await;
    // The same document shows up again, this time with its content
    mount_wp_page(&server, "2", json!([post(&site, 9, "2019-03-01T10:00:00")]), 1).await;

    let db = TempDir::new().unwrap();
    let coordinator = Coordinator::open(wordpress_config(&db, &server)).unwrap();
    let summary = crawl(&coordinator).await;

    assert_eq!(summary.responses, 2);
    assert_eq!(summary.articles, 10);

    let responses = entities(&coordinator, EntityKind::Response);
    let second_page = responses
        .iter()
        .find_map(|e| match e {
            Entity::Response(r) if r.page == 2 => Some(r.name.clone()),
            _ => None,
        })
        .expect("second page should be stored");

    let late = entities(&coordinator, EntityKind::Article)
        .into_iter()
        .find_map(|e| match e {
            Entity::Article(a) if a.url.ends_with("/post-9") => Some(a),
            _ => None,
        })
        .expect("post 9 should be collected from the second page");
    assert_eq!(late.response, second_page);
    assert!(!late.content.is_empty());
}

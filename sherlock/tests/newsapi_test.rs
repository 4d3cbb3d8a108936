use common::Region;
use mockito::Matcher;
use sherlock::ingestion::{FeedFetcher, NewsApiFetcher};
use sherlock::query::build_query;

const BODY: &str = r#"{
    "status": "ok",
    "totalResults": 3,
    "articles": [
        {
            "source": {"id": null, "name": "Example Post"},
            "title": "Acme beats estimates",
            "description": "<p>Strong <b>growth</b> in Q3.</p>",
            "url": "https://post.example/acme-q3",
            "publishedAt": "2025-10-06T08:00:00Z"
        },
        {
            "source": {"id": "wire", "name": "Wire"},
            "title": null,
            "description": null,
            "url": "https://wire.example/acme",
            "publishedAt": "not a date"
        },
        {
            "source": {"id": null, "name": "Third"},
            "title": "Third story",
            "url": "https://third.example/x",
            "publishedAt": "2025-10-05T08:00:00Z"
        }
    ]
}"#;

#[tokio::test]
async fn test_newsapi_fetch_maps_articles() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/everything")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "Acme".into()),
            Matcher::UrlEncoded("language".into(), "en".into()),
            Matcher::UrlEncoded("sortBy".into(), "publishedAt".into()),
            Matcher::UrlEncoded("pageSize".into(), "2".into()),
            Matcher::UrlEncoded("apiKey".into(), "test-key".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(BODY)
        .create_async()
        .await;

    let fetcher =
        NewsApiFetcher::new(format!("{}/v2/everything", server.url()), "test-key", 5).unwrap();
    let query = build_query("Acme", Region::India).unwrap();
    let entries = fetcher.fetch(&query, 2).await.unwrap();

    mock.assert_async().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].title.as_deref(), Some("Acme beats estimates"));
    assert_eq!(entries[0].link, "https://post.example/acme-q3");
    assert_eq!(entries[0].source.as_deref(), Some("Example Post"));
    assert_eq!(entries[0].published_at, "2025-10-06T08:00:00Z");
    assert!(entries[0].published.is_some());

    assert!(entries[1].title.is_none());
    assert_eq!(entries[1].summary_html, "");
    assert_eq!(entries[1].published_at, "not a date");
    assert!(entries[1].published.is_none());
}

#[tokio::test]
async fn test_newsapi_error_status_is_a_fetch_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v2/everything")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"status":"error","code":"apiKeyInvalid"}"#)
        .create_async()
        .await;

    let fetcher =
        NewsApiFetcher::new(format!("{}/v2/everything", server.url()), "bad-key", 5).unwrap();
    let query = build_query("Acme", Region::Global).unwrap();
    assert!(fetcher.fetch(&query, 5).await.is_err());
}

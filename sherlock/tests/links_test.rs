use sherlock::links::{HttpLinkResolver, LinkResolver};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_redirect_chain_resolves_to_publisher_url() {
    let mut server = mockito::Server::new_async().await;
    let publisher_url = format!("{}/business/acme-record-quarter", server.url());

    let hop = server
        .mock("GET", "/rss/articles/CBMiabc")
        .with_status(302)
        .with_header("location", "/r/acme")
        .create_async()
        .await;
    server
        .mock("GET", "/r/acme")
        .with_status(301)
        .with_header("location", publisher_url.as_str())
        .create_async()
        .await;
    let landing = server
        .mock("GET", "/business/acme-record-quarter")
        .with_status(200)
        .with_body("<html><body>Acme</body></html>")
        .create_async()
        .await;

    let resolver = HttpLinkResolver::new(5, 10).unwrap();
    let resolved = resolver
        .resolve(&format!("{}/rss/articles/CBMiabc", server.url()))
        .await;

    assert_eq!(resolved, publisher_url);
    hop.assert_async().await;
    landing.assert_async().await;
}

#[tokio::test]
async fn test_non_success_final_status_keeps_original() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/rss/articles/missing")
        .with_status(302)
        .with_header("location", "/gone")
        .create_async()
        .await;
    server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;

    let original = format!("{}/rss/articles/missing", server.url());
    let resolver = HttpLinkResolver::new(5, 10).unwrap();
    assert!(resolver.try_resolve(&original).await.is_err());
    assert_eq!(resolver.resolve(&original).await, original);
}

#[tokio::test]
async fn test_redirect_loop_is_bounded() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/loop")
        .with_status(302)
        .with_header("location", "/loop")
        .create_async()
        .await;

    let original = format!("{}/loop", server.url());
    let resolver = HttpLinkResolver::new(5, 3).unwrap();
    assert_eq!(resolver.resolve(&original).await, original);
}

#[tokio::test]
async fn test_timeout_keeps_original_after_single_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            held.push(socket);
        }
    });

    let original = format!("http://{}/rss/articles/slow", addr);
    let resolver = HttpLinkResolver::new(1, 10).unwrap();
    let started = Instant::now();
    assert_eq!(resolver.resolve(&original).await, original);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(accepted.load(std::sync::atomic::Ordering::SeqCst), 1);
}

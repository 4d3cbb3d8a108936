// Manual check of the feed source for one entity: prints the query URL and
// the first entries with their normalized summary and sentiment.
//
//   cargo run --bin test_feed -- "Acme Corp" IN

use common::Region;
use sherlock::ingestion::{FeedFetcher, SyndicationFetcher};
use sherlock::normalize::summary_text;
use sherlock::query::{build_query, GOOGLE_NEWS_SEARCH_URL};
use sherlock::sentiment::{classification_text, SentimentClassifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let entity = args.next().unwrap_or_else(|| "Reuters".to_string());
    let region = Region::parse(&args.next().unwrap_or_default());

    let query = build_query(&entity, region)?;
    let base_url =
        std::env::var("FEED_BASE_URL").unwrap_or_else(|_| GOOGLE_NEWS_SEARCH_URL.to_string());

    println!("\n{}", "=".repeat(60));
    println!("Entity: {} ({})", query.terms, query.region);
    println!("URL: {}", query.feed_url(&base_url)?);
    println!("{}", "=".repeat(60));

    let fetcher = SyndicationFetcher::new(base_url, 10)?;
    let classifier = SentimentClassifier::new();

    match fetcher.fetch(&query, 5).await {
        Ok(entries) => {
            println!("✓ {} entries", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let title = entry.title.as_deref().unwrap_or("<no title>");
                let text = summary_text(&entry.summary_html);
                let (label, score) = classifier.classify(&classification_text(title, &text));
                println!("  {}. {}", i + 1, title);
                println!("     URL: {}", entry.link);
                println!("     Published: {}", entry.published_at);
                println!("     Sentiment: {} ({:+.3})", label, score);
                println!("     Summary: {} chars", text.chars().count());
            }
        }
        Err(e) => println!("✗ Failed: {:#}", e),
    }

    Ok(())
}

/*
sherlock - watchlist news digest
Fetches news for every watchlist entity, classifies sentiment and prints the per-entity digests.
Runs once (--once) or on a refresh timer until ctrl-c.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::{Config, FeedConfig, RegionOverride};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::select;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use sherlock::digest::CycleReport;
use sherlock::ingestion::{FeedFetcher, NewsApiFetcher, SyndicationFetcher, NEWSAPI_EVERYTHING_URL};
use sherlock::links::{
    HttpLinkResolver, LinkResolver, PassthroughResolver, DEFAULT_MAX_REDIRECTS,
    DEFAULT_RESOLVE_TIMEOUT_SECS,
};
use sherlock::pipeline::{CycleOptions, Pipeline, PipelineSettings};
use sherlock::query::GOOGLE_NEWS_SEARCH_URL;
use sherlock::scraping::{PageEnricher, DEFAULT_SUPPRESSED_IMAGE_HOSTS};

#[derive(Parser, Debug)]
#[command(name = "sherlock", about = "Watchlist news digest with sentiment counts")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Region override for every entity (Off, Global, IN, US)
    #[arg(long, value_name = "REGION")]
    region: Option<String>,

    /// Only keep articles whose title contains this text
    #[arg(long)]
    search: Option<String>,

    /// Only keep articles whose title contains this keyword
    #[arg(long)]
    keyword: Option<String>,

    /// Print the cycle report as JSON
    #[arg(long)]
    json: bool,

    /// Enrich articles from their pages (text, summary, image)
    #[arg(long)]
    enrich: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries only the report.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config.clone() {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() {
            Some(&default_path)
        } else {
            None
        },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    if config.watchlist.is_empty() {
        warn!("watchlist is empty; nothing to fetch");
    }

    let pipeline = build_pipeline(&config, args.enrich)?;
    let region_override = match args.region.as_deref() {
        Some(r) => RegionOverride::parse(r),
        None => config
            .pipeline
            .as_ref()
            .and_then(|p| p.region_override)
            .unwrap_or_default(),
    };
    let options = CycleOptions::new(region_override, args.search.clone(), args.keyword.clone());
    info!(?region_override, "cycle options ready");

    if args.once {
        let report = pipeline.run_cycle(&config.watchlist, &options).await;
        return render(&report, args.json);
    }

    let refresh_secs = config
        .pipeline
        .as_ref()
        .and_then(|p| p.refresh_seconds)
        .unwrap_or(900)
        .max(1);
    info!(refresh_secs, "entering refresh loop");

    let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        // One cycle at a time; each finished report replaces the previous output.
        select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received during cycle, stopping");
                break;
            }
            report = pipeline.run_cycle(&config.watchlist, &options) => {
                if let Err(e) = render(&report, args.json) {
                    error!("failed to render report: {:#}", e);
                }
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn build_pipeline(config: &Config, force_enrich: bool) -> Result<Pipeline> {
    let fetcher = create_feed_fetcher(&config.feed)?;
    info!(fetcher = fetcher.name(), "feed fetcher initialized");

    let links = config.links.clone().unwrap_or_default();
    let resolver: Arc<dyn LinkResolver> = if links.enabled.unwrap_or(true) {
        Arc::new(HttpLinkResolver::new(
            links.timeout_seconds.unwrap_or(DEFAULT_RESOLVE_TIMEOUT_SECS),
            links.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
        )?)
    } else {
        info!("link resolution disabled");
        Arc::new(PassthroughResolver)
    };

    let mut pipeline = Pipeline::new(fetcher, resolver, PipelineSettings::from_config(config));

    let enrichment = config.enrichment.clone().unwrap_or_default();
    if force_enrich || enrichment.enabled.unwrap_or(false) {
        let hosts = enrichment.suppressed_image_hosts.unwrap_or_else(|| {
            DEFAULT_SUPPRESSED_IMAGE_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect()
        });
        let enricher = PageEnricher::new(enrichment.timeout_seconds.unwrap_or(10), hosts)?;
        info!(
            max_articles = pipeline.settings().enrich_max_articles,
            "article enrichment enabled"
        );
        pipeline = pipeline.with_enricher(Arc::new(enricher));
    }

    Ok(pipeline)
}

/// Create the feed fetcher selected by `feed.provider`
fn create_feed_fetcher(feed: &FeedConfig) -> Result<Arc<dyn FeedFetcher>> {
    let provider = feed.provider.as_deref().unwrap_or("google_news");
    let timeout_secs = feed.timeout_seconds.unwrap_or(10);
    match provider {
        "google_news" => {
            let base_url = feed
                .base_url
                .clone()
                .unwrap_or_else(|| GOOGLE_NEWS_SEARCH_URL.to_string());
            Ok(Arc::new(SyndicationFetcher::new(base_url, timeout_secs)?))
        }
        "newsapi" => {
            let api_key_env = feed.api_key_env.as_deref().unwrap_or("NEWS_API_KEY");
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("NewsAPI key env var '{}' not set", api_key_env))?;
            let base_url = feed
                .base_url
                .clone()
                .unwrap_or_else(|| NEWSAPI_EVERYTHING_URL.to_string());
            Ok(Arc::new(NewsApiFetcher::new(base_url, api_key, timeout_secs)?))
        }
        _ => anyhow::bail!("Unknown feed provider: {}", provider),
    }
}

fn render(report: &CycleReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{}", out);
        return Ok(());
    }

    let rows = report.summary();
    println!(
        "\n=== Sentiment summary ({}) ===",
        report.fetched_at.format("%Y-%m-%d %H:%M UTC")
    );
    if rows.is_empty() {
        println!("No articles found.");
        return Ok(());
    }
    println!(
        "{:<10} {:<28} {:<7} {:>4} {:>4} {:>4} {:>5}  {}",
        "category", "entity", "region", "pos", "neu", "neg", "total", "anchor"
    );
    for row in &rows {
        println!(
            "{:<10} {:<28} {:<7} {:>4} {:>4} {:>4} {:>5}  #{}",
            row.category.as_str(),
            row.entity,
            row.region.as_str(),
            row.positive,
            row.neutral,
            row.negative,
            row.total,
            row.anchor
        );
    }

    for digest in report.digests.iter().filter(|d| !d.is_empty()) {
        println!(
            "\n## {} [{}] #{} ({})",
            digest.entity,
            digest.region,
            digest.anchor(),
            digest.last_fetched_label()
        );
        for article in digest.articles() {
            println!(
                "  [{:<8} {:+.2}] {}",
                article.sentiment_label.as_str(),
                article.sentiment_score,
                article.title
            );
            println!("      {}", article.resolved_link);
            if !article.published_at.is_empty() {
                println!("      published: {}", article.published_at);
            }
            if let Some(summary) = article.enrichment.as_ref().and_then(|e| e.summary.as_ref()) {
                println!("      {}", summary);
            } else if !article.summary_text.is_empty() {
                println!("      {}", article.summary_text);
            }
        }
    }
    Ok(())
}

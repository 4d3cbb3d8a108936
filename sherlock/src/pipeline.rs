use chrono::{DateTime, Utc};
use common::{Category, Config, Region, RegionOverride, Watchlist, WatchlistEntry};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::digest::{Article, CycleReport, DigestStage, EntityDigest};
use crate::ingestion::{FeedFetcher, RawEntry};
use crate::links::LinkResolver;
use crate::normalize::summary_text;
use crate::query::build_query;
use crate::scraping::ArticleEnricher;
use crate::sentiment::{classification_text, SentimentClassifier};

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_ENTITY_CONCURRENCY: usize = 4;
pub const DEFAULT_ENRICH_MAX_ARTICLES: usize = 5;

/// Cycle knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_results: usize,
    pub entity_concurrency: usize,
    /// Enriched articles per entity, first in feed order
    pub enrich_max_articles: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            entity_concurrency: DEFAULT_ENTITY_CONCURRENCY,
            enrich_max_articles: DEFAULT_ENRICH_MAX_ARTICLES,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_results: config.feed.max_results.unwrap_or(defaults.max_results),
            entity_concurrency: config
                .pipeline
                .as_ref()
                .and_then(|p| p.entity_concurrency)
                .unwrap_or(defaults.entity_concurrency)
                .max(1),
            enrich_max_articles: config
                .enrichment
                .as_ref()
                .and_then(|e| e.max_articles)
                .unwrap_or(defaults.enrich_max_articles),
        }
    }
}

/// Per-cycle inputs from the caller: region override and title filters.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    pub region_override: RegionOverride,
    /// Global search: case-insensitive substring of the title
    pub search: Option<String>,
    /// Keyword filter: case-insensitive substring of the title
    pub keyword: Option<String>,
}

impl CycleOptions {
    pub fn new(
        region_override: RegionOverride,
        search: Option<String>,
        keyword: Option<String>,
    ) -> Self {
        let clean = |s: Option<String>| {
            s.map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
        };
        Self {
            region_override,
            search: clean(search),
            keyword: clean(keyword),
        }
    }

    /// Both filters must match when set.
    pub fn matches_title(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        [&self.search, &self.keyword]
            .into_iter()
            .flatten()
            .all(|needle| title.contains(needle.to_lowercase().as_str()))
    }

    fn has_filters(&self) -> bool {
        self.search.is_some() || self.keyword.is_some()
    }
}

/// Builds entity digests from the configured feed, resolver and optional enricher.
///
/// Cheap to clone; every collaborator is shared behind an `Arc`.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn FeedFetcher>,
    resolver: Arc<dyn LinkResolver>,
    enricher: Option<Arc<dyn ArticleEnricher>>,
    classifier: Arc<SentimentClassifier>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        resolver: Arc<dyn LinkResolver>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            enricher: None,
            classifier: Arc::new(SentimentClassifier::new()),
            settings,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn ArticleEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs every watchlist entity once and collects the digests in watchlist order.
    ///
    /// The watchlist is only read; entities run concurrently up to
    /// `entity_concurrency` and never share state.
    pub async fn run_cycle(&self, watchlist: &Watchlist, options: &CycleOptions) -> CycleReport {
        let cycle = watchlist.cycle_entries();
        for (category, name, reason) in &cycle.skipped {
            warn!(%category, entity = %name, "skipping watchlist entry: {}", reason);
        }

        let fetched_at = Utc::now();
        let total = cycle.entries.len();
        info!(entities = total, "starting fetch cycle");

        let semaphore = Arc::new(Semaphore::new(self.settings.entity_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for (idx, (category, entry)) in cycle.entries.into_iter().enumerate() {
            let pipeline = self.clone();
            let options = options.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let digest = pipeline
                    .digest_entity(category, &entry, &options, fetched_at)
                    .await;
                (idx, digest)
            });
        }

        let mut slots: Vec<Option<EntityDigest>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, digest)) => slots[idx] = Some(digest),
                Err(e) => error!("entity task failed: {}", e),
            }
        }

        let report = CycleReport {
            fetched_at,
            digests: slots.into_iter().flatten().collect(),
        };
        info!(
            entities = report.digests.len(),
            articles = report.article_count(),
            "fetch cycle complete"
        );
        report
    }

    /// Digest for one entity. Never fails: a fetch error or an empty feed
    /// yields a digest with zero articles.
    pub async fn digest_entity(
        &self,
        category: Category,
        entry: &WatchlistEntry,
        options: &CycleOptions,
        fetched_at: DateTime<Utc>,
    ) -> EntityDigest {
        let region = options.region_override.effective(entry.region);
        debug!(entity = %entry.name, %region, stage = ?DigestStage::Pending, "digest started");

        let query = match build_query(&entry.name, region) {
            Ok(q) => q,
            Err(e) => {
                warn!(entity = %entry.name, "not fetching: {}", e);
                return EntityDigest::empty(entry.name.trim(), category, region, fetched_at);
            }
        };

        let raw_entries = match self.fetcher.fetch(&query, self.settings.max_results).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    entity = %query.terms,
                    %region,
                    fetcher = self.fetcher.name(),
                    error = %format!("{:#}", e),
                    "feed fetch failed, digest left empty"
                );
                Vec::new()
            }
        };
        debug!(entity = %query.terms, count = raw_entries.len(), stage = ?DigestStage::Fetched, "feed fetched");
        if raw_entries.is_empty() {
            return EntityDigest::empty(query.terms, category, region, fetched_at);
        }

        let mut articles = Vec::with_capacity(raw_entries.len());
        for raw in raw_entries.into_iter().take(self.settings.max_results) {
            let Some(title) = usable_title(&raw) else {
                debug!(entity = %query.terms, link = %raw.link, "skipping entry without title");
                continue;
            };
            if raw.link.trim().is_empty() {
                debug!(entity = %query.terms, %title, "skipping entry without link");
                continue;
            }
            if !options.matches_title(&title) {
                continue;
            }

            let enrich = articles.len() < self.settings.enrich_max_articles;
            articles.push(self.build_article(raw, title, &query.terms, region, enrich).await);
        }
        if options.has_filters() {
            debug!(entity = %query.terms, kept = articles.len(), stage = ?DigestStage::Filtered, "title filters applied");
        }

        EntityDigest::aggregate(query.terms, category, region, fetched_at, articles)
    }

    async fn build_article(
        &self,
        raw: RawEntry,
        title: String,
        entity: &str,
        region: Region,
        enrich: bool,
    ) -> Article {
        let resolved_link = self.resolver.resolve(&raw.link).await;
        let summary_text = summary_text(&raw.summary_html);
        let (sentiment_label, sentiment_score) = self
            .classifier
            .classify(&classification_text(&title, &summary_text));

        let enrichment = match (&self.enricher, enrich) {
            (Some(enricher), true) => Some(enricher.enrich(&resolved_link).await),
            _ => None,
        };

        Article {
            title,
            raw_link: raw.link,
            resolved_link,
            published_at: raw.published_at,
            published: raw.published,
            source: raw.source,
            summary_raw: raw.summary_html,
            summary_text,
            sentiment_label,
            sentiment_score,
            source_entity: entity.to_string(),
            source_region: region,
            enrichment,
        }
    }
}

fn usable_title(raw: &RawEntry) -> Option<String> {
    raw.title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

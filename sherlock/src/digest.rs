//! Per-entity digests and the per-cycle summary table.

use chrono::{DateTime, Utc};
use common::{Category, Region};
use serde::Serialize;

use crate::scraping::Enrichment;
use crate::sentiment::SentimentLabel;

/// One processed feed entry. Rebuilt from scratch every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    /// Link as delivered by the feed (may point at the provider's redirector)
    pub raw_link: String,
    /// Destination after redirects; equals `raw_link` when resolution failed
    pub resolved_link: String,
    /// Publication time as the feed wrote it, unmodified
    pub published_at: String,
    pub published: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub summary_raw: String,
    /// Normalized summary, at most 500 characters
    pub summary_text: String,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub source_entity: String,
    pub source_region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn from_articles(articles: &[Article]) -> Self {
        let mut counts = SentimentCounts::default();
        for article in articles {
            match article.sentiment_label {
                SentimentLabel::Positive => counts.positive += 1,
                SentimentLabel::Neutral => counts.neutral += 1,
                SentimentLabel::Negative => counts.negative += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

/// Lifecycle of one entity within a cycle.
///
/// `Fetched` is terminal when the feed produced nothing (or failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DigestStage {
    Pending,
    Fetched,
    Filtered,
    Aggregated,
}

/// Articles and sentiment counts for one entity in one cycle.
///
/// Counts are computed once from the article list and cannot be set
/// independently of it.
#[derive(Debug, Clone, Serialize)]
pub struct EntityDigest {
    pub entity: String,
    pub category: Category,
    pub region: Region,
    pub fetched_at: DateTime<Utc>,
    pub stage: DigestStage,
    articles: Vec<Article>,
    counts: SentimentCounts,
}

impl EntityDigest {
    /// Digest for an entity whose feed yielded no entries.
    pub fn empty(
        entity: impl Into<String>,
        category: Category,
        region: Region,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity: entity.into(),
            category,
            region,
            fetched_at,
            stage: DigestStage::Fetched,
            articles: Vec::new(),
            counts: SentimentCounts::default(),
        }
    }

    /// Digest over `articles` (already filtered), in feed order.
    pub fn aggregate(
        entity: impl Into<String>,
        category: Category,
        region: Region,
        fetched_at: DateTime<Utc>,
        articles: Vec<Article>,
    ) -> Self {
        let counts = SentimentCounts::from_articles(&articles);
        Self {
            entity: entity.into(),
            category,
            region,
            fetched_at,
            stage: DigestStage::Aggregated,
            articles,
            counts,
        }
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn counts(&self) -> SentimentCounts {
        self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// "last fetched" label shown next to the digest.
    pub fn last_fetched_label(&self) -> String {
        format!("last fetched {}", self.fetched_at.format("%Y-%m-%d %H:%M UTC"))
    }

    pub fn anchor(&self) -> String {
        format!("{}-{}", self.category, anchor_for(&self.entity))
    }
}

/// URL-fragment-safe slug: lowercase ASCII alphanumerics, other runs collapsed to `-`.
pub fn anchor_for(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("entity");
    }
    slug
}

/// One summary table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub category: Category,
    pub entity: String,
    pub anchor: String,
    pub region: Region,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub total: usize,
}

/// Result of one full pass over the watchlist.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub fetched_at: DateTime<Utc>,
    /// One digest per processed entity, in watchlist order
    pub digests: Vec<EntityDigest>,
}

impl CycleReport {
    /// Rows for entities with at least one article; empty digests are left out.
    pub fn summary(&self) -> Vec<SummaryRow> {
        self.digests
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| {
                let counts = d.counts();
                SummaryRow {
                    category: d.category,
                    entity: d.entity.clone(),
                    anchor: d.anchor(),
                    region: d.region,
                    positive: counts.positive,
                    neutral: counts.neutral,
                    negative: counts.negative,
                    total: counts.total(),
                }
            })
            .collect()
    }

    pub fn article_count(&self) -> usize {
        self.digests.iter().map(|d| d.articles().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, label: SentimentLabel) -> Article {
        Article {
            title: title.to_string(),
            raw_link: "https://news.example/a".to_string(),
            resolved_link: "https://news.example/a".to_string(),
            published_at: String::new(),
            published: None,
            source: None,
            summary_raw: String::new(),
            summary_text: String::new(),
            sentiment_label: label,
            sentiment_score: 0.0,
            source_entity: "Acme".to_string(),
            source_region: Region::Global,
            enrichment: None,
        }
    }

    #[test]
    fn test_counts_partition_articles() {
        let articles = vec![
            article("a", SentimentLabel::Positive),
            article("b", SentimentLabel::Negative),
            article("c", SentimentLabel::Positive),
            article("d", SentimentLabel::Neutral),
        ];
        let digest = EntityDigest::aggregate(
            "Acme",
            Category::Companies,
            Region::India,
            Utc::now(),
            articles,
        );
        let counts = digest.counts();
        assert_eq!(
            counts,
            SentimentCounts {
                positive: 2,
                neutral: 1,
                negative: 1
            }
        );
        assert_eq!(counts.total(), digest.articles().len());
        assert_eq!(digest.stage, DigestStage::Aggregated);
        let titles: Vec<_> = digest.articles().iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_anchor_slug() {
        assert_eq!(anchor_for("Acme Corp."), "acme-corp");
        assert_eq!(anchor_for("  AT&T  Inc "), "at-t-inc");
        assert_eq!(anchor_for("Zoë Lin"), "zoë-lin");
        assert_eq!(anchor_for("***"), "entity");
    }

    #[test]
    fn test_summary_skips_empty_digests() {
        let now = Utc::now();
        let report = CycleReport {
            fetched_at: now,
            digests: vec![
                EntityDigest::aggregate(
                    "Acme",
                    Category::Companies,
                    Region::India,
                    now,
                    vec![article("a", SentimentLabel::Negative)],
                ),
                EntityDigest::empty("Globex", Category::Companies, Region::Global, now),
                EntityDigest::aggregate("Jane Doe", Category::Persons, Region::Global, now, vec![]),
            ],
        };

        let rows = report.summary();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity, "Acme");
        assert_eq!(rows[0].anchor, "companies-acme");
        assert_eq!(rows[0].negative, 1);
        assert_eq!(rows[0].total, 1);
        assert_eq!(report.article_count(), 1);
        assert_eq!(report.digests[1].stage, DigestStage::Fetched);
    }

    #[test]
    fn test_last_fetched_label() {
        let at = DateTime::parse_from_rfc3339("2025-10-06T08:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let digest = EntityDigest::empty("Acme", Category::Companies, Region::Global, at);
        assert_eq!(digest.last_fetched_label(), "last fetched 2025-10-06 08:05 UTC");
    }
}

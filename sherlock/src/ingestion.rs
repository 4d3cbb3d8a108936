use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::query::SearchQuery;

/// NewsAPI search endpoint used when the "newsapi" provider has no `feed.base_url`.
pub const NEWSAPI_EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";

/// One entry as delivered by the feed source, before any processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: String,
    /// Structured publication time when the source date was parseable
    pub published: Option<DateTime<Utc>>,
    /// Publication time exactly as the source wrote it; empty when it had none
    pub published_at: String,
    /// Summary markup; empty when the entry had none
    pub summary_html: String,
    /// Publisher name, when known
    pub source: Option<String>,
}

/// Retrieves the raw entries for a search.
///
/// Implementations return errors for network, status and parse failures;
/// the aggregator turns those into an empty entry list for that entity.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// At most `max_results` entries, in feed order.
    async fn fetch(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<RawEntry>>;

    fn name(&self) -> &'static str;
}

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("Sherlock/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build reqwest client")
}

/// Syndication (RSS/Atom) search feed templated as
/// `{base}?q={query}&hl={lang}&gl={country}&ceid={country}:{langShort}`.
pub struct SyndicationFetcher {
    base_url: String,
    client: Client,
}

impl SyndicationFetcher {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: build_client(timeout_secs)?,
        })
    }
}

#[async_trait::async_trait]
impl FeedFetcher for SyndicationFetcher {
    async fn fetch(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<RawEntry>> {
        let url = query.feed_url(&self.base_url)?;
        info!(entity = %query.terms, region = %query.region, "fetching feed {}", url);

        // Single attempt: the caller's refresh cadence is the retry mechanism.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("network error during feed fetch")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("feed fetch failed with status: {}", status);
        }

        let bytes = response
            .bytes()
            .await
            .context("failed to read feed response body")?;
        parse_feed(bytes.as_ref(), max_results)
    }

    fn name(&self) -> &'static str {
        "syndication"
    }
}

/// Parses an RSS/Atom body into at most `max_results` entries, preserving order.
pub fn parse_feed(body: &[u8], max_results: usize) -> Result<Vec<RawEntry>> {
    let feed = parser::parse(body).context("failed to parse feed")?;
    debug!("parsed feed with {} entries", feed.entries.len());
    let mut raw_dates = raw_entry_dates(body).into_iter();
    Ok(feed
        .entries
        .into_iter()
        .take(max_results)
        .map(|entry| entry_to_raw(entry, raw_dates.next().flatten()))
        .collect())
}

#[derive(Debug, Clone, Copy)]
enum DateField {
    Published,
    Updated,
}

impl DateField {
    fn from_tag(local_name: &[u8]) -> Option<Self> {
        match local_name {
            b"pubDate" | b"published" | b"date" => Some(Self::Published),
            b"updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct EntryDates {
    published: Option<String>,
    updated: Option<String>,
}

impl EntryDates {
    fn record(&mut self, field: DateField, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let slot = match field {
            DateField::Published => &mut self.published,
            DateField::Updated => &mut self.updated,
        };
        slot.get_or_insert_with(|| text.to_string());
    }
}

/// Source date text of every `<item>`/`<entry>`, in document order.
///
/// feed-rs only exposes dates it managed to parse, so the raw strings are read
/// in a second pass. Entries are matched to feed-rs entries by position.
fn raw_entry_dates(body: &[u8]) -> Vec<Option<String>> {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut entries: Vec<EntryDates> = Vec::new();
    let mut depth = 0usize;
    let mut entry_depth: Option<usize> = None;
    let mut capture: Option<DateField> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.local_name();
                match entry_depth {
                    None if matches!(name.as_ref(), b"item" | b"entry") => {
                        entry_depth = Some(depth);
                        entries.push(EntryDates::default());
                    }
                    Some(d) if depth == d + 1 => capture = DateField::from_tag(name.as_ref()),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if entry_depth == Some(depth) {
                    entry_depth = None;
                }
                capture = None;
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(t)) => {
                if let (Some(field), Some(dates)) = (capture, entries.last_mut()) {
                    if let Ok(text) = t.unescape() {
                        dates.record(field, &text);
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let (Some(field), Some(dates)) = (capture, entries.last_mut()) {
                    dates.record(field, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("stopped reading raw entry dates: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    entries
        .into_iter()
        .map(|d| d.published.or(d.updated))
        .collect()
}

fn entry_to_raw(entry: Entry, raw_date: Option<String>) -> RawEntry {
    let title = entry.title.map(|t| t.content);
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let published = entry.published.or(entry.updated);
    let summary_html = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();
    let source = title.as_deref().and_then(publisher_from_title);

    RawEntry {
        title,
        link,
        published,
        published_at: raw_date
            .or_else(|| published.map(|d| d.to_rfc3339()))
            .unwrap_or_default(),
        summary_html,
        source,
    }
}

/// Search feeds append the publisher as `"Headline - Publisher"`.
pub fn publisher_from_title(title: &str) -> Option<String> {
    let (headline, publisher) = title.rsplit_once(" - ")?;
    let publisher = publisher.trim();
    if headline.trim().is_empty() || publisher.is_empty() {
        return None;
    }
    Some(publisher.to_string())
}

/// NewsAPI-style JSON search: `{base}?q=..&language=..&sortBy=publishedAt&pageSize=..&apiKey=..`
pub struct NewsApiFetcher {
    base_url: String,
    api_key: String,
    client: Client,
}

impl NewsApiFetcher {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: build_client(timeout_secs)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    description: Option<String>,
    source: Option<NewsApiSource>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

impl From<NewsApiArticle> for RawEntry {
    fn from(a: NewsApiArticle) -> Self {
        let published = a
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        RawEntry {
            title: a.title,
            link: a.url.unwrap_or_default(),
            published,
            published_at: a.published_at.unwrap_or_default(),
            summary_html: a.description.unwrap_or_default(),
            source: a.source.and_then(|s| s.name),
        }
    }
}

#[async_trait::async_trait]
impl FeedFetcher for NewsApiFetcher {
    async fn fetch(&self, query: &SearchQuery, max_results: usize) -> Result<Vec<RawEntry>> {
        info!(entity = %query.terms, region = %query.region, "fetching NewsAPI results");

        let page_size = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query.terms.as_str()),
                ("language", query.locale.lang_short()),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("network error during NewsAPI fetch")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("NewsAPI fetch failed with status: {}", status);
        }

        let body: NewsApiResponse = response
            .json()
            .await
            .context("failed to parse NewsAPI response")?;
        Ok(body
            .articles
            .into_iter()
            .take(max_results)
            .map(RawEntry::from)
            .collect())
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}

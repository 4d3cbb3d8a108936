use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::normalize::{truncate_chars, truncate_with_ellipsis};

/// Cap on `extracted_text`, in characters (an ellipsis is appended when cut).
pub const EXTRACTED_TEXT_MAX_CHARS: usize = 500;
/// Cap on the extractive summary, in characters.
pub const EXTRACTIVE_SUMMARY_MAX_CHARS: usize = 300;

/// Image proxies owned by the feed provider; their images are generic placeholders.
pub const DEFAULT_SUPPRESSED_IMAGE_HOSTS: &[&str] = &[
    "googleusercontent.com",
    "gstatic.com",
    "ggpht.com",
    "news.google.com",
];

const CONTENT_SELECTORS: &[&str] = &["article", "main", ".post-content", ".entry-content", "#content"];
const IMAGE_META_SELECTORS: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
    r#"meta[property="twitter:image"]"#,
];

/// Best-effort extras for an article. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Enrichment {
    pub extracted_text: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.extracted_text.is_none() && self.summary.is_none() && self.image_url.is_none()
    }
}

/// Downloads an article page and pulls text, a short summary and an image from it.
///
/// Never fails: any error yields `Enrichment::default()`.
#[async_trait::async_trait]
pub trait ArticleEnricher: Send + Sync {
    async fn enrich(&self, url: &str) -> Enrichment;
}

pub struct PageEnricher {
    client: Client,
    suppressed_hosts: Vec<String>,
}

impl PageEnricher {
    pub fn new(timeout_secs: u64, suppressed_hosts: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("Sherlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            suppressed_hosts: suppressed_hosts
                .into_iter()
                .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        })
    }

    pub fn with_default_hosts(timeout_secs: u64) -> Result<Self> {
        Self::new(
            timeout_secs,
            DEFAULT_SUPPRESSED_IMAGE_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        )
    }

    pub async fn try_enrich(&self, url: &str) -> Result<Enrichment> {
        let url_obj = Url::parse(url).context("failed to parse article URL")?;
        let response = self
            .client
            .get(url_obj)
            .send()
            .await
            .context("failed to fetch article page")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("article fetch failed with status: {}", status);
        }
        // Relative image paths resolve against where the redirects ended up.
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .context("failed to read response body")?;

        Ok(self.enrich_html(&html, &final_url))
    }

    /// Enrichment from an already downloaded page.
    pub fn enrich_html(&self, html: &str, page_url: &Url) -> Enrichment {
        let text = extract_text(html, page_url);
        let image_url = extract_image(html, page_url).filter(|img| !self.is_suppressed(img));

        let (extracted_text, summary) = match text {
            Some(text) => {
                let summary = extractive_summary(&text, EXTRACTIVE_SUMMARY_MAX_CHARS);
                (
                    Some(truncate_with_ellipsis(&text, EXTRACTED_TEXT_MAX_CHARS)),
                    summary,
                )
            }
            None => (None, None),
        };

        Enrichment {
            extracted_text,
            summary,
            image_url,
        }
    }

    fn is_suppressed(&self, image_url: &str) -> bool {
        let host = match Url::parse(image_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        {
            Some(h) => h,
            None => return true,
        };
        self.suppressed_hosts
            .iter()
            .any(|s| host == *s || host.ends_with(&format!(".{}", s)))
    }
}

#[async_trait::async_trait]
impl ArticleEnricher for PageEnricher {
    async fn enrich(&self, url: &str) -> Enrichment {
        match self.try_enrich(url).await {
            Ok(enrichment) => {
                debug!(url, empty = enrichment.is_empty(), "enriched article");
                enrichment
            }
            Err(e) => {
                warn!(url, error = %format!("{:#}", e), "article enrichment failed");
                Enrichment::default()
            }
        }
    }
}

/// Main body text: readability first, then common content containers, then all paragraphs.
fn extract_text(html: &str, page_url: &Url) -> Option<String> {
    let mut reader = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut reader, page_url) {
        Ok(product) => {
            let text = match html2text::from_read(product.content.as_bytes(), 80) {
                Ok(text) => text,
                Err(e) => {
                    warn!("scraping: failed to render extracted HTML to text: {}", e);
                    product.text
                }
            };
            if let Some(text) = clean_text(&text) {
                debug!("scraping: readability extracted {} chars from {}", text.len(), page_url);
                return Some(text);
            }
        }
        Err(e) => debug!("scraping: readability failed for {}: {}", page_url, e),
    }

    let document = Html::parse_document(html);
    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            if let Some(text) = render_text(&element.html()) {
                info!("scraping: found content using selector '{}'", selector_str);
                return Some(text);
            }
        }
    }

    let p_selector = Selector::parse("p").ok()?;
    let paragraphs: String = document
        .select(&p_selector)
        .map(|p| p.html())
        .collect::<Vec<_>>()
        .join("\n");
    render_text(&paragraphs)
}

fn render_text(html: &str) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }
    html2text::from_read(html.as_bytes(), 80)
        .ok()
        .and_then(|t| clean_text(&t))
}

fn clean_text(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// First `og:image`/`twitter:image` of the page, absolutized against `page_url`.
fn extract_image(html: &str, page_url: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    IMAGE_META_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::trim)
                .find(|c| !c.is_empty())
                .map(str::to_string)
        })
        .and_then(|content| page_url.join(&content).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
}

/// Leading whole sentences of `text` that fit in `max_chars`.
///
/// A first sentence longer than the cap is cut at the cap instead.
pub fn extractive_summary(text: &str, max_chars: usize) -> Option<String> {
    // Punctuation split: abbreviations such as "U.S." end a sentence early.
    let sentences: Vec<&str> = text
        .split_inclusive(['.', '!', '?'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let first = sentences.first()?;
    if first.chars().count() > max_chars {
        return Some(truncate_with_ellipsis(first, max_chars.saturating_sub(1)));
    }

    let mut summary = String::new();
    for sentence in sentences {
        let candidate_len = summary.chars().count() + sentence.chars().count() + 1;
        if !summary.is_empty() && candidate_len > max_chars {
            break;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(sentence);
    }
    Some(truncate_chars(&summary, max_chars))
}

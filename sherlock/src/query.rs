//! Search query construction: (entity name, region) → feed query + locale.

use anyhow::{bail, Context, Result};
use common::Region;
use serde::Serialize;
use url::Url;

/// Syndication search endpoint used when no `feed.base_url` is configured.
pub const GOOGLE_NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";

/// Language/country pair sent to the feed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Locale {
    /// `hl` parameter, e.g. "en-IN"
    pub lang: &'static str,
    /// `gl` parameter, e.g. "IN"
    pub country: &'static str,
}

impl Locale {
    pub fn for_region(region: Region) -> Self {
        match region {
            Region::India => Locale {
                lang: "en-IN",
                country: "IN",
            },
            Region::UnitedStates => Locale {
                lang: "en-US",
                country: "US",
            },
            // Global shares the US edition, with a bare language tag.
            Region::Global => Locale {
                lang: "en",
                country: "US",
            },
        }
    }

    /// Language without the country suffix ("en-IN" → "en").
    pub fn lang_short(&self) -> &'static str {
        match self.lang.split_once('-') {
            Some((short, _)) => short,
            None => self.lang,
        }
    }

    /// `ceid` parameter, e.g. "IN:en"
    pub fn ceid(&self) -> String {
        format!("{}:{}", self.country, self.lang_short())
    }
}

/// A locale-correct search for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub terms: String,
    pub region: Region,
    pub locale: Locale,
}

impl SearchQuery {
    /// URL-encoded query string: `q=..&hl=..&gl=..&ceid=..`
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params())
            .finish()
    }

    /// Feed endpoint for this query, appended to whatever query `base` already carries.
    pub fn feed_url(&self, base: &str) -> Result<Url> {
        let mut url =
            Url::parse(base).with_context(|| format!("invalid feed base URL: {}", base))?;
        url.query_pairs_mut().extend_pairs(self.params());
        Ok(url)
    }

    fn params(&self) -> [(&'static str, String); 4] {
        [
            ("q", self.terms.clone()),
            ("hl", self.locale.lang.to_string()),
            ("gl", self.locale.country.to_string()),
            ("ceid", self.locale.ceid()),
        ]
    }
}

/// Build the search for `entity_name` in `region`.
///
/// The name must be non-empty after trimming; callers skip such entries
/// instead of fetching.
pub fn build_query(entity_name: &str, region: Region) -> Result<SearchQuery> {
    let terms = entity_name.trim();
    if terms.is_empty() {
        bail!("entity name is empty");
    }
    Ok(SearchQuery {
        terms: terms.to_string(),
        region,
        locale: Locale::for_region(region),
    })
}

/*!
common/src/lib.rs

Shared configuration and watchlist types for Sherlock.

This file provides:
- Config data structures (deserialized from TOML)
- The watchlist model: categories, entities and their news regions
- An async loader that merges a default config file with an optional override
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Coarse geographic bucket controlling the feed query language/country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    #[default]
    Global,
    India,
    UnitedStates,
}

impl Region {
    /// Case-insensitive; anything that is not `IN` or `US` lands in `Global`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Region::India,
            "US" => Region::UnitedStates,
            _ => Region::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Global => "Global",
            Region::India => "IN",
            Region::UnitedStates => "US",
        }
    }
}

impl From<String> for Region {
    fn from(s: String) -> Self {
        Region::parse(&s)
    }
}

impl From<Region> for String {
    fn from(r: Region) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cycle-wide region setting. Anything other than `Off` replaces every
/// entity's configured region for the whole fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegionOverride {
    #[default]
    Off,
    Force(Region),
}

impl RegionOverride {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("off") || t.eq_ignore_ascii_case("none") {
            RegionOverride::Off
        } else {
            RegionOverride::Force(Region::parse(t))
        }
    }

    /// The region actually used for an entity configured with `configured`.
    pub fn effective(&self, configured: Region) -> Region {
        match self {
            RegionOverride::Off => configured,
            RegionOverride::Force(r) => *r,
        }
    }
}

impl From<String> for RegionOverride {
    fn from(s: String) -> Self {
        RegionOverride::parse(&s)
    }
}

impl From<RegionOverride> for String {
    fn from(o: RegionOverride) -> Self {
        match o {
            RegionOverride::Off => "Off".to_string(),
            RegionOverride::Force(r) => r.as_str().to_string(),
        }
    }
}

/// Watchlist category an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Companies,
    Persons,
    Products,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Companies => "companies",
            Category::Persons => "persons",
            Category::Products => "products",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked entity. Owned by the configuration; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub name: String,
    #[serde(default)]
    pub region: Region,
}

impl WatchlistEntry {
    pub fn new(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
        }
    }
}

/// Entity lists per category, in display order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watchlist {
    #[serde(default)]
    pub companies: Vec<WatchlistEntry>,
    #[serde(default)]
    pub persons: Vec<WatchlistEntry>,
    #[serde(default)]
    pub products: Vec<WatchlistEntry>,
}

/// Why a configured entity was left out of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BlankName,
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BlankName => f.write_str("blank entity name"),
            SkipReason::Duplicate => f.write_str("duplicate entity name in category"),
        }
    }
}

/// Read-only snapshot of the watchlist for one fetch cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleWatchlist {
    pub entries: Vec<(Category, WatchlistEntry)>,
    pub skipped: Vec<(Category, String, SkipReason)>,
}

impl Watchlist {
    pub fn category(&self, category: Category) -> &[WatchlistEntry] {
        match category {
            Category::Companies => &self.companies,
            Category::Persons => &self.persons,
            Category::Products => &self.products,
        }
    }

    /// Ordered entries for a cycle. Names are trimmed, blank names dropped and
    /// names repeated within a category (case-insensitive) keep the first one.
    pub fn cycle_entries(&self) -> CycleWatchlist {
        let mut out = CycleWatchlist::default();
        for category in [Category::Companies, Category::Persons, Category::Products] {
            let mut seen = HashSet::new();
            for entry in self.category(category) {
                let name = entry.name.trim();
                if name.is_empty() {
                    out.skipped
                        .push((category, entry.name.clone(), SkipReason::BlankName));
                    continue;
                }
                if !seen.insert(name.to_lowercase()) {
                    out.skipped
                        .push((category, name.to_string(), SkipReason::Duplicate));
                    continue;
                }
                out.entries
                    .push((category, WatchlistEntry::new(name, entry.region)));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.companies.len() + self.persons.len() + self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Feed source section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    /// "google_news" (syndication search feed) or "newsapi" (JSON search API)
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub max_results: Option<usize>,
    pub timeout_seconds: Option<u64>,
    /// Environment variable holding the NewsAPI key
    pub api_key_env: Option<String>,
}

/// Redirect resolution section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// `false` keeps feed links as delivered
    pub enabled: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub max_redirects: Option<usize>,
}

/// Best-effort article enrichment section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub enabled: Option<bool>,
    pub timeout_seconds: Option<u64>,
    pub max_articles: Option<usize>,
    /// Image hosts (suffix match) that belong to the feed provider rather than the publisher
    pub suppressed_image_hosts: Option<Vec<String>>,
}

/// Cycle orchestration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub region_override: Option<RegionOverride>,
    pub entity_concurrency: Option<usize>,
    pub refresh_seconds: Option<u64>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    pub links: Option<LinkConfig>,
    pub enrichment: Option<EnrichmentConfig>,
    pub pipeline: Option<PipelineConfig>,
    #[serde(default)]
    pub watchlist: Watchlist,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

// Arrays are replaced wholesale, so an override watchlist is never appended to the default one.
fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn region_parsing_is_case_insensitive_with_global_fallback() {
        assert_eq!(Region::parse("in"), Region::India);
        assert_eq!(Region::parse(" US "), Region::UnitedStates);
        assert_eq!(Region::parse("Global"), Region::Global);
        assert_eq!(Region::parse("UK"), Region::Global);
        assert_eq!(Region::parse(""), Region::Global);
    }

    #[test]
    fn region_serde_round_trips_through_codes() {
        let r: Region = serde_json::from_str("\"IN\"").unwrap();
        assert_eq!(r, Region::India);
        assert_eq!(serde_json::to_string(&Region::UnitedStates).unwrap(), "\"US\"");
    }

    #[test]
    fn region_override_supersedes_configured_region() {
        assert_eq!(RegionOverride::parse("Off"), RegionOverride::Off);
        assert_eq!(
            RegionOverride::parse("us").effective(Region::India),
            Region::UnitedStates
        );
        assert_eq!(RegionOverride::Off.effective(Region::India), Region::India);
        assert_eq!(
            RegionOverride::parse("Global").effective(Region::UnitedStates),
            Region::Global
        );
    }

    #[test]
    fn cycle_entries_drop_blank_and_duplicate_names() {
        let wl = Watchlist {
            companies: vec![
                WatchlistEntry::new(" Acme ", Region::India),
                WatchlistEntry::new("   ", Region::Global),
                WatchlistEntry::new("ACME", Region::UnitedStates),
                WatchlistEntry::new("Globex", Region::Global),
            ],
            persons: vec![WatchlistEntry::new("Acme", Region::Global)],
            products: vec![],
        };

        let cycle = wl.cycle_entries();
        let names: Vec<_> = cycle
            .entries
            .iter()
            .map(|(c, e)| (*c, e.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                (Category::Companies, "Acme"),
                (Category::Companies, "Globex"),
                (Category::Persons, "Acme"),
            ]
        );
        assert_eq!(cycle.entries[0].1.region, Region::India);
        assert_eq!(cycle.skipped.len(), 2);
        assert_eq!(cycle.skipped[0].2, SkipReason::BlankName);
        assert_eq!(cycle.skipped[1].2, SkipReason::Duplicate);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
            [feed]
            provider = "google_news"
            max_results = 8

            [pipeline]
            region_override = "IN"

            [[watchlist.companies]]
            name = "Acme"
            region = "IN"

            [[watchlist.persons]]
            name = "Jane Doe"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.feed.max_results, Some(8));
        assert_eq!(
            cfg.pipeline.and_then(|p| p.region_override),
            Some(RegionOverride::Force(Region::India))
        );
        assert_eq!(cfg.watchlist.companies[0].region, Region::India);
        assert_eq!(cfg.watchlist.persons[0].region, Region::Global);
        assert!(cfg.links.is_none());
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");

        fs::write(
            &default_path,
            r#"
            [feed]
            max_results = 5
            timeout_seconds = 10

            [[watchlist.companies]]
            name = "Default Co"
            "#,
        )
        .unwrap();
        fs::write(
            &override_path,
            r#"
            [feed]
            max_results = 20

            [[watchlist.companies]]
            name = "Acme"
            region = "US"
            "#,
        )
        .unwrap();

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");
        assert_eq!(cfg.feed.max_results, Some(20));
        assert_eq!(cfg.feed.timeout_seconds, Some(10));
        assert_eq!(cfg.watchlist.companies.len(), 1);
        assert_eq!(cfg.watchlist.companies[0].name, "Acme");
    }

    #[tokio::test]
    async fn missing_files_yield_empty_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_with_defaults(Some(&dir.path().join("nope.toml")), None)
            .await
            .expect("load config");
        assert!(cfg.watchlist.is_empty());
        assert!(cfg.feed.provider.is_none());
    }
}

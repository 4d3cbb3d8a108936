use anyhow::{Context, Result};
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Maps an indirected article link to its canonical destination.
///
/// Resolution is advisory: implementations never fail, any error yields the
/// original URL unchanged.
#[async_trait::async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> String;
}

/// Follows HTTP redirects with a short timeout, one attempt per link.
pub struct HttpLinkResolver {
    client: Client,
}

impl HttpLinkResolver {
    pub fn new(timeout_secs: u64, max_redirects: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(redirect::Policy::limited(max_redirects))
            .user_agent(concat!("Sherlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }

    /// Final URL after redirects, or an error for malformed URLs, timeouts,
    /// transport failures and non-2xx final responses.
    pub async fn try_resolve(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url).context("malformed article URL")?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .context("redirect lookup failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("redirect lookup ended with status: {}", status);
        }
        Ok(response.url().to_string())
    }
}

#[async_trait::async_trait]
impl LinkResolver for HttpLinkResolver {
    async fn resolve(&self, url: &str) -> String {
        match self.try_resolve(url).await {
            Ok(resolved) => {
                debug!(from = url, to = %resolved, "resolved article link");
                resolved
            }
            Err(e) => {
                warn!(url, error = %format!("{:#}", e), "link resolution failed, keeping original");
                url.to_string()
            }
        }
    }
}

/// Leaves every link as delivered by the feed.
pub struct PassthroughResolver;

#[async_trait::async_trait]
impl LinkResolver for PassthroughResolver {
    async fn resolve(&self, url: &str) -> String {
        url.to_string()
    }
}

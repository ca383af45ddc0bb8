//! Page retrieval behind the [`PageFetcher`] boundary.
//!
//! The watch loop only needs rendered markup for a URL. [`HttpFetcher`] gets it
//! with reqwest; a browser-driven fetcher can be plugged in through the trait.

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// User-Agent string identifying this watcher
const USER_AGENT: &str = concat!(
    "slotwatch/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/cladam/slotwatch)"
);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to fetch page: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Timeout opening page")]
    Timeout,
    #[error("could not retrieve page: {0}")]
    Navigation(String),
    #[error("failed to read session: {0}")]
    Session(#[from] std::io::Error),
}

/// Saved browser session, passed to the fetcher untouched.
///
/// The watch loop neither creates nor reads it; only a [`PageFetcher`] may
/// interpret the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(contents: impl Into<String>) -> Self {
        Self(contents.into())
    }

    /// Load the session at `path` if the file exists
    pub fn load_if_present(path: &Path) -> Result<Option<Self>, FetchError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(Self(contents)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Source of rendered page markup
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieve the markup at `url`, acting as the session's user if one is given
    async fn fetch(
        &self,
        url: &str,
        session: Option<&SessionToken>,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

/// Plain HTTP fetcher. Serves pages that render without JavaScript.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        session: Option<&SessionToken>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let mut request = self.client.get(url).timeout(timeout);

        if let Some(cookie) = session.and_then(|s| cookie_header(s, url)) {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e)
            }
        })?;
        let html = response.error_for_status()?.text().await?;
        debug!(url, bytes = html.len(), "page fetched");
        Ok(html)
    }
}

/// Browser storage state as saved after an interactive login
#[derive(Debug, Deserialize)]
struct StorageState {
    #[serde(default)]
    cookies: Vec<StoredCookie>,
}

#[derive(Debug, Deserialize)]
struct StoredCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: String,
}

/// Build a `Cookie` header from the session's cookies that apply to `url`
fn cookie_header(session: &SessionToken, url: &str) -> Option<String> {
    let state: StorageState = serde_json::from_str(session.as_str()).ok()?;
    let host = Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();

    let pairs: Vec<String> = state
        .cookies
        .iter()
        .filter(|c| domain_matches(&host, &c.domain))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();

    (!pairs.is_empty()).then(|| pairs.join("; "))
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{}", domain))
}

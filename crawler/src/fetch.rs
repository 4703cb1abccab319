use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header;
use std::time::Duration;
use url::Url;

/// Page source. `None` means the page could not be used, for whatever reason.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Tries per page; transport errors are retried, bad responses are not.
    pub attempts: usize,
    pub redirects: usize,
    pub max_body: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "search-engine-rs-bot/0.1".into(),
            timeout: Duration::from_secs(12),
            attempts: 3,
            redirects: 3,
            max_body: 2 * 1024 * 1024,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.redirects))
            .timeout(config.timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client, config })
    }

    fn is_html(resp: &Response) -> bool {
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }

    fn read(&self, url: &Url, resp: Response) -> Option<String> {
        if !resp.status().is_success() {
            tracing::debug!(%url, status = %resp.status(), "unsuccessful status");
            return None;
        }
        if !Self::is_html(&resp) {
            tracing::debug!(%url, "not html");
            return None;
        }
        if resp.content_length().is_some_and(|n| n > self.config.max_body as u64) {
            tracing::debug!(%url, "body over cap");
            return None;
        }
        let bytes = match resp.bytes() {
            Ok(b) => b,
            Err(err) => {
                tracing::debug!(%url, error = %err, "reading body failed");
                return None;
            }
        };
        if bytes.len() > self.config.max_body {
            tracing::debug!(%url, len = bytes.len(), "body over cap");
            return None;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Option<String> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        for attempt in 1..=self.config.attempts.max(1) {
            match self.client.get(url.clone()).send() {
                Ok(resp) => return self.read(url, resp),
                Err(err) => tracing::debug!(%url, attempt, error = %err, "fetch failed"),
            }
        }
        None
    }
}

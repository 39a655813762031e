//! HTTP page fetcher used by the monitor.
//!
//! Fetches one URL at a time, refuses private/loopback targets, and hands
//! the body to [`crate::extract`] for visible-text extraction.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::redirect::Policy;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use url::Url;

use lookout_shared::{FeedEntry, LookoutError, MonitorConfig, Result};

use crate::extract::{extract_text, truncate_chars};
use crate::feeds::parse_feed;

/// Browser-like User-Agent; several marketing sites serve bots a stub page.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// Fetches pages and feeds for monitored targets.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    max_content_length: usize,
    /// Allow localhost/private IPs (for tests against mock servers).
    allow_private: bool,
}

impl PageFetcher {
    /// Create a fetcher from the monitor config (timeout, truncation length).
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        Self::build(config, false)
    }

    /// A fetcher that may reach localhost/private IPs (integration tests,
    /// intranet targets).
    pub fn with_private_hosts(config: &MonitorConfig) -> Result<Self> {
        Self::build(config, true)
    }

    fn build(config: &MonitorConfig, allow_private: bool) -> Result<Self> {
        // Every redirect hop goes through the same address check as the first request.
        let policy = Policy::custom(move |attempt| {
            match check_redirect(attempt.url(), attempt.previous().len(), allow_private) {
                Ok(()) => attempt.follow(),
                Err(reason) => attempt.error(reason),
            }
        });

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(policy)
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| LookoutError::Network(format!("failed to build HTTP client: {e}")))?;

        if config.enable_selenium {
            debug!("browser rendering requested; pages are fetched over plain HTTP");
        }

        Ok(Self {
            client,
            max_content_length: config.max_content_length,
            allow_private,
        })
    }

    /// Fetch `url` and return its visible text, truncated to the configured length.
    #[instrument(skip(self))]
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.fetch_body(url).await?;
        let text = extract_text(&body);
        debug!(chars = text.chars().count(), "extracted page text");
        Ok(truncate_chars(&text, self.max_content_length).to_string())
    }

    /// Fetch every feed in `urls` and return entries published in the last
    /// `lookback`, newest first. Feeds that fail are logged and skipped.
    #[instrument(skip_all, fields(feeds = urls.len()))]
    pub async fn fetch_feed_entries(
        &self,
        urls: &[String],
        lookback: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Vec<FeedEntry> {
        let cutoff = now - lookback;
        let mut entries = Vec::new();

        for url in urls {
            let parsed = match self.fetch_body(url).await {
                Ok(body) => parse_feed(body.as_bytes(), url, cutoff),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(found) => {
                    debug!(%url, entries = found.len(), "parsed feed");
                    entries.extend(found);
                }
                Err(e) => warn!(%url, error = %e, "failed to read feed"),
            }
        }

        entries.sort_by(|a, b| b.published.cmp(&a.published));
        entries
    }

    async fn fetch_body(&self, raw: &str) -> Result<String> {
        let url = Url::parse(raw).map_err(|e| LookoutError::validation(format!("{raw}: {e}")))?;

        if !self.allow_private && is_ssrf_target(&url) {
            return Err(LookoutError::Network(format!(
                "{url}: blocked private or non-HTTP address"
            )));
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| LookoutError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookoutError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| LookoutError::Network(format!("{url}: body read failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Decide whether to follow a redirect to `next` after `hops` earlier requests.
fn check_redirect(next: &Url, hops: usize, allow_private: bool) -> std::result::Result<(), String> {
    if hops > MAX_REDIRECTS {
        return Err(format!("too many redirects (limit {MAX_REDIRECTS})"));
    }
    if !allow_private && is_ssrf_target(next) {
        return Err(format!("redirect to blocked address {next}"));
    }
    Ok(())
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let head = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7 (unique local)
                || (head & 0xfe00) == 0xfc00
                // fe80::/10 (link-local)
                || (head & 0xffc0) == 0xfe80
        }
    }
}

/// Compute SHA-256 hash of content as lowercase hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

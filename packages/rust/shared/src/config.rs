//! Application configuration for Lookout.
//!
//! System settings live in `config.json` (working directory by default).
//! Secrets never go in that file; they come from the environment, optionally
//! seeded from a `.env` file by the binaries.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

// ---------------------------------------------------------------------------
// Config structs (matching config.json schema)
// ---------------------------------------------------------------------------

/// How often the scheduler produces a full report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        })
    }
}

/// A delivery channel for finished summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Slack,
    Notion,
    Email,
    Webhook,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Slack => "slack",
            Self::Notion => "notion",
            Self::Email => "email",
            Self::Webhook => "webhook",
        })
    }
}

/// Top-level monitor config, deserialized from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Scheduler cadence.
    #[serde(default = "default_frequency")]
    pub monitoring_frequency: Frequency,

    /// Model used for per-channel analysis and the executive summary.
    #[serde(default = "default_ai_model")]
    pub ai_model: String,

    /// Cheaper model used to list concrete changes between snapshots.
    #[serde(default = "default_change_model")]
    pub change_model: String,

    /// Extracted page text is truncated to this many characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Request browser rendering for dynamic pages. Only plain HTTP
    /// fetching is available, so this is accepted and reported.
    #[serde(default = "default_true", alias = "enable_browser")]
    pub enable_selenium: bool,

    /// Channels that receive the summary.
    #[serde(default = "default_notification_channels")]
    pub notification_channels: Vec<ChannelKind>,

    /// Keywords counted in changelog content.
    #[serde(default = "default_changelog_keywords")]
    pub changelog_keywords: Vec<String>,

    /// Keywords counted in pricing content.
    #[serde(default = "default_pricing_keywords")]
    pub pricing_keywords: Vec<String>,

    /// How far back RSS entries are considered, in days.
    #[serde(default = "default_rss_lookback_days")]
    pub rss_lookback_days: i64,

    /// Directory that receives markdown reports.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// libSQL database holding history and run records.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitoring_frequency: default_frequency(),
            ai_model: default_ai_model(),
            change_model: default_change_model(),
            max_content_length: default_max_content_length(),
            timeout: default_timeout(),
            enable_selenium: true,
            notification_channels: default_notification_channels(),
            changelog_keywords: default_changelog_keywords(),
            pricing_keywords: default_pricing_keywords(),
            rss_lookback_days: default_rss_lookback_days(),
            reports_dir: default_reports_dir(),
            database_path: default_database_path(),
        }
    }
}

fn default_frequency() -> Frequency {
    Frequency::Weekly
}
fn default_ai_model() -> String {
    "gpt-4".into()
}
fn default_change_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_content_length() -> usize {
    5000
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_notification_channels() -> Vec<ChannelKind> {
    vec![ChannelKind::Slack, ChannelKind::Notion]
}
fn default_changelog_keywords() -> Vec<String> {
    ["release", "update", "new", "feature", "version"]
        .map(String::from)
        .to_vec()
}
fn default_pricing_keywords() -> Vec<String> {
    ["price", "pricing", "cost", "plan", "subscription"]
        .map(String::from)
        .to_vec()
}
fn default_rss_lookback_days() -> i64 {
    7
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_database_path() -> PathBuf {
    PathBuf::from("lookout.db")
}

// ---------------------------------------------------------------------------
// Credentials (environment only)
// ---------------------------------------------------------------------------

/// Secrets and endpoints resolved from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_channel: String,
    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,
    pub smtp: Option<SmtpSettings>,
    pub webhook_url: Option<String>,
    pub database_url: Option<String>,
}

/// SMTP relay settings; present only when host, sender and recipient are all set.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
}

/// Default Slack channel when `SLACK_CHANNEL` is unset.
pub const DEFAULT_SLACK_CHANNEL: &str = "#competitive-intelligence";

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let smtp = match (get("SMTP_HOST"), get("EMAIL_FROM"), get("EMAIL_TO")) {
            (Some(host), Some(from), Some(to)) => Some(SmtpSettings {
                host,
                port: get("SMTP_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(465),
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from,
                to,
            }),
            _ => None,
        };

        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            slack_bot_token: get("SLACK_BOT_TOKEN"),
            slack_channel: get("SLACK_CHANNEL").unwrap_or_else(|| DEFAULT_SLACK_CHANNEL.into()),
            notion_token: get("NOTION_TOKEN"),
            notion_database_id: get("NOTION_DATABASE_ID"),
            smtp,
            webhook_url: get("WEBHOOK_URL"),
            database_url: get("DATABASE_URL"),
        }
    }

    /// Whether the given delivery channel has everything it needs.
    pub fn is_configured(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Slack => self.slack_bot_token.is_some(),
            ChannelKind::Notion => self.notion_token.is_some() && self.notion_database_id.is_some(),
            ChannelKind::Email => self.smtp.is_some(),
            ChannelKind::Webhook => self.webhook_url.is_some(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the monitor config from `path`. Returns defaults if the file does not exist.
pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(MonitorConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| LookoutError::io(path, e))?;

    serde_json::from_str(&content)
        .map_err(|e| LookoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write `config` to `path` as pretty JSON.
pub fn save_config(path: &Path, config: &MonitorConfig) -> Result<()> {
    let content =
        serde_json::to_string_pretty(config).map_err(|e| LookoutError::config(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LookoutError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| LookoutError::io(path, e))
}

/// Write a default config file at `path`, refusing to clobber an existing one.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(LookoutError::config(format!(
            "{} already exists",
            path.display()
        )));
    }
    save_config(path, &MonitorConfig::default())?;
    tracing::info!(?path, "created default config file");
    Ok(path.to_path_buf())
}

/// Check that an OpenAI-compatible API key is present.
pub fn validate_api_key(credentials: &Credentials) -> Result<()> {
    match &credentials.openai_api_key {
        Some(key) if !key.is_empty() => Ok(()),
        _ => Err(LookoutError::config(
            "OpenAI API key not found. Set the OPENAI_API_KEY environment variable \
             (or add it to .env).",
        )),
    }
}

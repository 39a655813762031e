//! Core domain types for monitoring runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for monitoring run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ContentKind
// ---------------------------------------------------------------------------

/// The kind of channel a piece of content was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Website,
    Changelog,
    Pricing,
    Blog,
    Social,
    AppStore,
}

impl ContentKind {
    /// Stable lowercase identifier, used in history keys and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Changelog => "changelog",
            Self::Pricing => "pricing",
            Self::Blog => "blog",
            Self::Social => "social",
            Self::AppStore => "app_store",
        }
    }

    /// Human-readable heading used in reports.
    pub fn title(self) -> &'static str {
        match self {
            Self::Website => "Website",
            Self::Changelog => "Changelog",
            Self::Pricing => "Pricing",
            Self::Blog => "Blog",
            Self::Social => "Social",
            Self::AppStore => "App Store",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "website" => Ok(Self::Website),
            "changelog" => Ok(Self::Changelog),
            "pricing" => Ok(Self::Pricing),
            "blog" => Ok(Self::Blog),
            "social" => Ok(Self::Social),
            "app_store" => Ok(Self::AppStore),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// MonitoringResult
// ---------------------------------------------------------------------------

/// One analyzed channel of one target, produced by a monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringResult {
    /// When the channel was analyzed.
    pub timestamp: DateTime<Utc>,
    /// Name of the monitored target.
    pub target_name: String,
    /// Channel kind.
    #[serde(rename = "content_type")]
    pub kind: ContentKind,
    /// Source URL (or comma-joined feed URLs for RSS results).
    pub url: String,
    /// SHA-256 of `raw_content`.
    pub content_hash: String,
    /// Extracted text that was analyzed.
    pub raw_content: String,
    /// Model-generated summary.
    pub ai_summary: String,
    /// Change notes; empty when nothing changed since the last snapshot.
    pub detected_changes: Vec<String>,
    /// Free-form extras (`entry_count`, `keyword_hits`, `platform`, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// Last known snapshot of a channel, keyed by [`history_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub key: String,
    pub url: String,
    pub content: String,
    pub hash: String,
    pub last_updated: DateTime<Utc>,
}

/// Build the history lookup key for a channel: `<target>_<kind>`.
///
/// Channels that can appear more than once per target (social profiles,
/// app store listings) pass a `label` to keep their snapshots apart.
pub fn history_key(target_name: &str, kind: ContentKind, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{target_name}_{kind}_{label}"),
        None => format!("{target_name}_{kind}"),
    }
}

// ---------------------------------------------------------------------------
// FeedEntry
// ---------------------------------------------------------------------------

/// A single RSS/Atom entry inside the lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: DateTime<Utc>,
    /// Feed URL the entry came from.
    pub source: String,
}

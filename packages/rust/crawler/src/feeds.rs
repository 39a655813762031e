//! RSS/Atom parsing with a publication-date window.

use chrono::{DateTime, Utc};

use lookout_shared::{FeedEntry, LookoutError, Result};

use crate::extract::extract_fragment_text;

/// Parse an RSS or Atom document and keep entries dated at or after `cutoff`.
///
/// The publication date falls back to the update date; entries with neither
/// are dropped. Summaries are reduced to plain text.
pub fn parse_feed(bytes: &[u8], source: &str, cutoff: DateTime<Utc>) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| LookoutError::parse(format!("{source}: invalid feed: {e}")))?;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry.published.or(entry.updated)?;
            if published < cutoff {
                return None;
            }

            let summary_html = entry
                .summary
                .map(|t| t.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Some(FeedEntry {
                title: entry
                    .title
                    .map(|t| t.content.trim().to_string())
                    .unwrap_or_default(),
                summary: extract_fragment_text(&summary_html),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                published,
                source: source.to_string(),
            })
        })
        .collect();

    Ok(entries)
}

//! Competitor targets and the `targets.json` file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LookoutError, Result};
use crate::types::ContentKind;

/// Default targets file name.
pub const TARGETS_FILE_NAME: &str = "targets.json";

/// A competitor and the URLs to watch for it.
///
/// Every field is always written back (absent optionals as `null`) so a
/// loaded file saves out in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub website_url: String,
    #[serde(default)]
    pub changelog_url: Option<String>,
    #[serde(default)]
    pub pricing_url: Option<String>,
    #[serde(default)]
    pub blog_url: Option<String>,
    #[serde(default)]
    pub social_urls: Option<Vec<String>>,
    /// Platform name (`ios`, `android`, ...) to listing URL.
    #[serde(default)]
    pub app_store_urls: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub rss_feeds: Option<Vec<String>>,
}

/// One page-like channel of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub kind: ContentKind,
    pub url: String,
    /// Disambiguates channels of the same kind (platform or social host).
    pub label: Option<String>,
}

impl Target {
    /// A target with only the required fields set.
    pub fn new(name: impl Into<String>, website_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website_url: website_url.into(),
            changelog_url: None,
            pricing_url: None,
            blog_url: None,
            social_urls: None,
            app_store_urls: None,
            rss_feeds: None,
        }
    }

    /// Check the name is non-empty and every URL is absolute http(s).
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LookoutError::validation("target name must not be empty"));
        }
        check_url("website_url", &self.website_url)?;
        for (field, url) in [
            ("changelog_url", &self.changelog_url),
            ("pricing_url", &self.pricing_url),
            ("blog_url", &self.blog_url),
        ] {
            if let Some(url) = url {
                check_url(field, url)?;
            }
        }
        for url in self.social_urls.iter().flatten() {
            check_url("social_urls", url)?;
        }
        for url in self.app_store_urls.iter().flat_map(|m| m.values()) {
            check_url("app_store_urls", url)?;
        }
        for url in self.rss_feeds.iter().flatten() {
            check_url("rss_feeds", url)?;
        }
        Ok(())
    }

    /// Page channels in monitoring order. RSS feeds are handled separately.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels = vec![Channel {
            kind: ContentKind::Website,
            url: self.website_url.clone(),
            label: None,
        }];

        for (kind, url) in [
            (ContentKind::Changelog, &self.changelog_url),
            (ContentKind::Pricing, &self.pricing_url),
            (ContentKind::Blog, &self.blog_url),
        ] {
            if let Some(url) = url {
                channels.push(Channel {
                    kind,
                    url: url.clone(),
                    label: None,
                });
            }
        }

        for url in self.social_urls.iter().flatten() {
            channels.push(Channel {
                kind: ContentKind::Social,
                url: url.clone(),
                label: Some(social_label(url)),
            });
        }

        for (platform, url) in self.app_store_urls.iter().flatten() {
            channels.push(Channel {
                kind: ContentKind::AppStore,
                url: url.clone(),
                label: Some(platform.clone()),
            });
        }

        channels
    }

    /// RSS feed URLs, empty when none are configured.
    pub fn feeds(&self) -> &[String] {
        self.rss_feeds.as_deref().unwrap_or(&[])
    }
}

fn check_url(field: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| LookoutError::validation(format!("{field}: invalid URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(LookoutError::validation(format!(
            "{field}: unsupported scheme '{other}' in '{raw}'"
        ))),
    }
}

/// Host plus path, so two profiles on the same network stay distinct.
fn social_label(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("social").trim_start_matches("www.");
            let path = url.path().trim_matches('/');
            if path.is_empty() {
                host.to_string()
            } else {
                format!("{host}/{path}")
            }
        }
        Err(_) => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Built-in demonstration targets used when no `targets.json` exists.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target {
            name: "Notion".into(),
            website_url: "https://www.notion.so".into(),
            changelog_url: Some("https://www.notion.so/releases".into()),
            pricing_url: Some("https://www.notion.so/pricing".into()),
            blog_url: Some("https://www.notion.so/blog".into()),
            social_urls: Some(vec!["https://twitter.com/notionhq".into()]),
            app_store_urls: Some(BTreeMap::from([
                (
                    "android".to_string(),
                    "https://play.google.com/store/apps/details?id=notion.id".to_string(),
                ),
                (
                    "ios".to_string(),
                    "https://apps.apple.com/app/notion-notes-docs-tasks/id1232780281".to_string(),
                ),
            ])),
            rss_feeds: None,
        },
        Target {
            name: "Airtable".into(),
            website_url: "https://www.airtable.com".into(),
            changelog_url: Some("https://support.airtable.com/docs/whats-new".into()),
            pricing_url: Some("https://www.airtable.com/pricing".into()),
            blog_url: Some("https://blog.airtable.com".into()),
            social_urls: Some(vec!["https://twitter.com/airtable".into()]),
            app_store_urls: None,
            rss_feeds: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Loading / saving
// ---------------------------------------------------------------------------

/// Load targets from `path`, falling back to [`default_targets`] if it is missing.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    if !path.exists() {
        tracing::warn!(?path, "targets file not found, using default targets");
        return Ok(default_targets());
    }
    load_targets_strict(path)
}

/// Load targets from `path`; a missing file is an error.
pub fn load_targets_strict(path: &Path) -> Result<Vec<Target>> {
    let content = std::fs::read_to_string(path).map_err(|e| LookoutError::io(path, e))?;
    let targets: Vec<Target> = serde_json::from_str(&content)
        .map_err(|e| LookoutError::config(format!("failed to parse {}: {e}", path.display())))?;
    for target in &targets {
        target.validate()?;
    }
    Ok(targets)
}

/// Write targets to `path` as pretty JSON (2-space indent).
pub fn save_targets(path: &Path, targets: &[Target]) -> Result<()> {
    let content =
        serde_json::to_string_pretty(targets).map_err(|e| LookoutError::config(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LookoutError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| LookoutError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("lookout-targets-{}", uuid::Uuid::now_v7()))
            .join(name)
    }

    #[test]
    fn fixture_round_trips_unchanged() {
        let fixture = Path::new("../../../fixtures/json/targets.json");
        let targets = load_targets_strict(fixture).expect("load fixture");
        assert_eq!(targets.len(), 2);

        let path = temp_path(TARGETS_FILE_NAME);
        save_targets(&path, &targets).expect("save");
        let first = std::fs::read_to_string(&path).expect("read");

        let reloaded = load_targets_strict(&path).expect("reload");
        assert_eq!(reloaded, targets);

        save_targets(&path, &reloaded).expect("save again");
        let second = std::fs::read_to_string(&path).expect("read again");
        assert_eq!(first, second);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn optionals_serialize_as_null() {
        let json = serde_json::to_value(Target::new("Acme", "https://acme.test")).unwrap();
        assert!(json["changelog_url"].is_null());
        assert!(json["rss_feeds"].is_null());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let targets = load_targets(&temp_path("absent.json")).expect("defaults");
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Notion", "Airtable"]);
        assert!(load_targets_strict(&temp_path("absent.json")).is_err());
    }

    #[test]
    fn default_targets_are_valid() {
        for target in default_targets() {
            target.validate().expect("default target should validate");
        }
    }

    #[test]
    fn validation_rejects_bad_targets() {
        assert!(Target::new("  ", "https://acme.test").validate().is_err());
        assert!(Target::new("Acme", "acme.test").validate().is_err());
        assert!(Target::new("Acme", "ftp://acme.test").validate().is_err());

        let mut target = Target::new("Acme", "https://acme.test");
        target.rss_feeds = Some(vec!["not a url".into()]);
        assert!(target.validate().is_err());
    }

    #[test]
    fn channels_in_order() {
        let target = &default_targets()[0];
        let kinds: Vec<ContentKind> = target.channels().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            [
                ContentKind::Website,
                ContentKind::Changelog,
                ContentKind::Pricing,
                ContentKind::Blog,
                ContentKind::Social,
                ContentKind::AppStore,
                ContentKind::AppStore,
            ]
        );

        let social = &target.channels()[4];
        assert_eq!(social.label.as_deref(), Some("twitter.com/notionhq"));
        let ios = &target.channels()[6];
        assert_eq!(ios.label.as_deref(), Some("ios"));
    }

    #[test]
    fn website_only_target() {
        let target = Target::new("Solo", "https://solo.test");
        assert_eq!(target.channels().len(), 1);
        assert!(target.feeds().is_empty());
    }
}

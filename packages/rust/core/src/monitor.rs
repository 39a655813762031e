//! One monitoring cycle: scrape every target channel, analyze it, and stage
//! history so a target only advances once all of its channels succeeded.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use lookout_crawler::{PageFetcher, compute_hash};
use lookout_shared::{
    Channel, ContentKind, FeedEntry, HistoryRecord, MonitorConfig, MonitoringResult, Result,
    RunId, Target, history_key,
};
use lookout_storage::{RunStatus, Storage};

use crate::analysis::{Analyst, keyword_hits, keywords_for};
use crate::pipeline::ProgressReporter;

/// Feed entries folded into one analyzed blog result.
const FEED_ENTRY_LIMIT: usize = 5;

/// Everything one target produced, ready to be committed.
#[derive(Debug, Default)]
pub struct TargetOutcome {
    pub results: Vec<MonitoringResult>,
    /// Snapshots to write once the target has fully succeeded.
    pub history: Vec<HistoryRecord>,
}

/// Result of [`Monitor::run_cycle`].
#[derive(Debug)]
pub struct CycleOutcome {
    pub run_id: RunId,
    pub results: Vec<MonitoringResult>,
    pub failed_targets: Vec<String>,
}

impl CycleOutcome {
    pub fn status(&self) -> RunStatus {
        if self.failed_targets.is_empty() {
            RunStatus::Completed
        } else if self.results.is_empty() {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }
}

/// Drives scraping and analysis for a fixed target list.
pub struct Monitor {
    config: MonitorConfig,
    targets: Vec<Target>,
    fetcher: PageFetcher,
    analyst: Analyst,
    storage: Storage,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        targets: Vec<Target>,
        fetcher: PageFetcher,
        analyst: Analyst,
        storage: Storage,
    ) -> Self {
        Self {
            config,
            targets,
            fetcher,
            analyst,
            storage,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Scrape and analyze every channel of `target`.
    ///
    /// A channel that cannot be fetched, or whose page has no text, is
    /// skipped. An analysis or storage failure fails the whole target.
    #[instrument(skip_all, fields(target = %target.name))]
    pub async fn monitor_target(&self, target: &Target) -> Result<TargetOutcome> {
        let mut outcome = TargetOutcome::default();

        for channel in target.channels() {
            let content = match self.fetcher.fetch_text(&channel.url).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(kind = %channel.kind, url = %channel.url, error = %e, "skipping channel");
                    continue;
                }
            };
            if content.trim().is_empty() {
                debug!(kind = %channel.kind, url = %channel.url, "page has no text");
                continue;
            }

            let (result, snapshot) = self.analyze_channel(target, &channel, content).await?;
            outcome.results.push(result);
            outcome.history.push(snapshot);
        }

        if !target.feeds().is_empty() {
            let lookback = chrono::Duration::days(self.config.rss_lookback_days);
            let entries = self
                .fetcher
                .fetch_feed_entries(target.feeds(), lookback, Utc::now())
                .await;
            if entries.is_empty() {
                debug!("no recent feed entries");
            } else {
                outcome.results.push(self.analyze_feeds(target, &entries).await?);
            }
        }

        Ok(outcome)
    }

    async fn analyze_channel(
        &self,
        target: &Target,
        channel: &Channel,
        content: String,
    ) -> Result<(MonitoringResult, HistoryRecord)> {
        let key = history_key(&target.name, channel.kind, channel.label.as_deref());
        let previous = self.storage.get_history(&key).await?;
        let analysis = self
            .analyst
            .analyze(&content, channel.kind, previous.as_ref())
            .await?;

        let mut metadata = BTreeMap::new();
        match (channel.kind, &channel.label) {
            (ContentKind::AppStore, Some(platform)) => {
                metadata.insert("platform".to_string(), Value::from(platform.as_str()));
            }
            (ContentKind::Social, Some(profile)) => {
                metadata.insert("profile".to_string(), Value::from(profile.as_str()));
            }
            _ => {}
        }
        let hits = keyword_hits(&content, keywords_for(channel.kind, &self.config));
        if !hits.is_empty() {
            let hits = hits
                .into_iter()
                .map(|(word, count)| (word, Value::from(count)))
                .collect::<serde_json::Map<_, _>>();
            metadata.insert("keyword_hits".to_string(), Value::Object(hits));
        }

        let now = Utc::now();
        let hash = compute_hash(&content);
        let snapshot = HistoryRecord {
            key,
            url: channel.url.clone(),
            content: content.clone(),
            hash: hash.clone(),
            last_updated: now,
        };
        let result = MonitoringResult {
            timestamp: now,
            target_name: target.name.clone(),
            kind: channel.kind,
            url: channel.url.clone(),
            content_hash: hash,
            raw_content: content,
            ai_summary: analysis.ai_summary,
            detected_changes: analysis.detected_changes,
            metadata,
        };
        Ok((result, snapshot))
    }

    async fn analyze_feeds(&self, target: &Target, entries: &[FeedEntry]) -> Result<MonitoringResult> {
        let content = format_feed_entries(entries);
        let analysis = self.analyst.analyze(&content, ContentKind::Blog, None).await?;

        let mut metadata = BTreeMap::new();
        metadata.insert("entry_count".to_string(), Value::from(entries.len()));

        Ok(MonitoringResult {
            timestamp: Utc::now(),
            target_name: target.name.clone(),
            kind: ContentKind::Blog,
            url: target.feeds().join(", "),
            content_hash: compute_hash(&content),
            raw_content: content,
            ai_summary: analysis.ai_summary,
            detected_changes: analysis.detected_changes,
            metadata,
        })
    }

    /// Monitor every target once and record the run.
    ///
    /// Failing targets are logged and listed in the outcome; their history
    /// is left untouched.
    #[instrument(skip_all, fields(targets = self.targets.len()))]
    pub async fn run_cycle(&self, progress: &dyn ProgressReporter) -> Result<CycleOutcome> {
        let run_id = RunId::new();
        self.storage.insert_run(&run_id).await?;
        info!(%run_id, "starting monitoring cycle");

        let mut results = Vec::new();
        let mut failed_targets = Vec::new();
        let total = self.targets.len();

        for (i, target) in self.targets.iter().enumerate() {
            progress.target_started(&target.name, i + 1, total);

            let outcome = match self.monitor_target(target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(target = %target.name, error = %e, "target failed");
                    failed_targets.push(target.name.clone());
                    continue;
                }
            };

            if let Err(e) = self.commit_target(&run_id, &outcome).await {
                warn!(target = %target.name, error = %e, "failed to store target results");
                failed_targets.push(target.name.clone());
                continue;
            }

            info!(target = %target.name, results = outcome.results.len(), "target monitored");
            results.extend(outcome.results);
        }

        let cycle = CycleOutcome {
            run_id,
            results,
            failed_targets,
        };
        self.storage
            .finish_run(
                &cycle.run_id,
                cycle.status(),
                cycle.results.len(),
                &cycle.failed_targets,
            )
            .await?;

        info!(
            run_id = %cycle.run_id,
            results = cycle.results.len(),
            failed = cycle.failed_targets.len(),
            "monitoring cycle finished"
        );
        Ok(cycle)
    }

    async fn commit_target(&self, run_id: &RunId, outcome: &TargetOutcome) -> Result<()> {
        for result in &outcome.results {
            self.storage.insert_result(run_id, result).await?;
        }
        self.storage.upsert_history_batch(&outcome.history).await
    }
}

/// Render feed entries the way they are sent for analysis.
pub fn format_feed_entries(entries: &[FeedEntry]) -> String {
    entries
        .iter()
        .take(FEED_ENTRY_LIMIT)
        .map(|e| format!("Title: {}\nSummary: {}\nLink: {}", e.title, e.summary, e.link))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::analysis::CHANGE_NOTE;
    use crate::llm::OpenAiClient;
    use crate::pipeline::SilentProgress;
    use crate::test_support::{
        mount_completion_for, mount_default_completion, mount_page, temp_storage,
    };

    const HOME: &str = "<html><body><h1>Acme</h1><p>Analytics for teams</p></body></html>";
    const PRICING: &str = "<html><body><p>Pro plan: $20 per seat</p></body></html>";

    async fn monitor_for(server: &MockServer, targets: Vec<Target>) -> Monitor {
        let config = MonitorConfig::default();
        let fetcher = PageFetcher::with_private_hosts(&config).unwrap();
        let client = OpenAiClient::new("sk-test").unwrap().with_base_url(server.uri());
        let analyst = Analyst::new(client, &config);
        Monitor::new(config, targets, fetcher, analyst, temp_storage().await)
    }

    fn acme(server: &MockServer) -> Target {
        let mut target = Target::new("Acme", format!("{}/", server.uri()));
        target.pricing_url = Some(format!("{}/pricing", server.uri()));
        target
    }

    async fn mount_site(server: &MockServer, pricing: &str) {
        mount_page(server, "/", HOME).await;
        mount_page(server, "/pricing", pricing).await;
    }

    #[test]
    fn feed_entries_are_capped_and_formatted() {
        let entries: Vec<FeedEntry> = (0..7)
            .map(|i| FeedEntry {
                title: format!("Post {i}"),
                summary: "text".into(),
                link: format!("https://acme.test/{i}"),
                published: Utc::now(),
                source: "https://acme.test/rss".into(),
            })
            .collect();
        let content = format_feed_entries(&entries);
        assert!(content.starts_with("Title: Post 0\nSummary: text\nLink: https://acme.test/0"));
        assert!(content.contains("Post 4"));
        assert!(!content.contains("Post 5"));
        assert_eq!(content.matches("\n\n").count(), 4);
    }

    #[tokio::test]
    async fn first_cycle_records_history_without_changes() {
        let server = MockServer::start().await;
        mount_site(&server, PRICING).await;
        mount_default_completion(&server, "Acme summary").await;

        let monitor = monitor_for(&server, vec![acme(&server)]).await;
        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();

        assert_eq!(cycle.status(), RunStatus::Completed);
        assert_eq!(cycle.results.len(), 2);
        assert_eq!(cycle.results[0].kind, ContentKind::Website);
        assert_eq!(cycle.results[1].kind, ContentKind::Pricing);
        assert!(cycle.results.iter().all(|r| r.detected_changes.is_empty()));
        assert_eq!(cycle.results[1].raw_content, "Pro plan: $20 per seat");

        let storage = monitor.storage();
        assert_eq!(storage.count_history().await.unwrap(), 2);
        let stored = storage.list_results_by_run(&cycle.run_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        let run = storage.latest_run().await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.result_count, 2);
    }

    #[tokio::test]
    async fn changed_page_is_reported_on_next_cycle() {
        let server = MockServer::start().await;
        mount_site(&server, PRICING).await;
        mount_default_completion(&server, "Acme summary").await;

        let monitor = monitor_for(&server, vec![acme(&server)]).await;
        monitor.run_cycle(&SilentProgress).await.unwrap();

        server.reset().await;
        mount_site(&server, "<html><body><p>Pro plan: $25 per seat</p></body></html>").await;
        mount_completion_for(&server, "Compare these two versions", "- Pro rose to $25").await;
        mount_default_completion(&server, "Acme summary").await;

        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();
        let website = &cycle.results[0];
        let pricing = &cycle.results[1];
        assert!(website.detected_changes.is_empty());
        assert_eq!(
            pricing.detected_changes,
            vec![CHANGE_NOTE.to_string(), "- Pro rose to $25".to_string()]
        );

        let key = history_key("Acme", ContentKind::Pricing, None);
        let snapshot = monitor.storage().get_history(&key).await.unwrap().unwrap();
        assert_eq!(snapshot.content, "Pro plan: $25 per seat");
    }

    #[tokio::test]
    async fn analysis_failure_skips_target_and_keeps_history() {
        let server = MockServer::start().await;
        mount_site(&server, PRICING).await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let monitor = monitor_for(&server, vec![acme(&server)]).await;
        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();

        assert!(cycle.results.is_empty());
        assert_eq!(cycle.failed_targets, vec!["Acme".to_string()]);
        assert_eq!(cycle.status(), RunStatus::Failed);
        assert_eq!(monitor.storage().count_history().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreachable_channel_is_skipped() {
        let server = MockServer::start().await;
        mount_page(&server, "/", HOME).await;
        mount_default_completion(&server, "Acme summary").await;

        // /pricing is not mounted, so it answers 404
        let monitor = monitor_for(&server, vec![acme(&server)]).await;
        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();

        assert_eq!(cycle.status(), RunStatus::Completed);
        assert_eq!(cycle.results.len(), 1);
        assert_eq!(cycle.results[0].kind, ContentKind::Website);
    }

    #[tokio::test]
    async fn unreachable_target_does_not_fail_the_run() {
        let server = MockServer::start().await;
        mount_site(&server, PRICING).await;
        mount_default_completion(&server, "Acme summary").await;

        let mut blocked = Target::new("Initech", "http://127.0.0.1:1/");
        blocked.blog_url = Some("http://127.0.0.1:1/blog".into());

        let monitor = monitor_for(&server, vec![acme(&server), blocked]).await;
        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();

        // Initech's pages are unreachable: its channels are skipped, not failed.
        assert_eq!(cycle.status(), RunStatus::Completed);
        assert!(cycle.results.iter().all(|r| r.target_name == "Acme"));
    }

    #[tokio::test]
    async fn app_store_and_keywords_land_in_metadata() {
        let server = MockServer::start().await;
        mount_page(&server, "/", HOME).await;
        mount_page(&server, "/ios", "<p>Acme for iPhone</p>").await;
        mount_page(
            &server,
            "/changelog",
            "<p>Release 2.0: new feature, plus a second feature.</p>",
        )
        .await;
        mount_default_completion(&server, "Summary").await;

        let mut target = Target::new("Acme", format!("{}/", server.uri()));
        target.changelog_url = Some(format!("{}/changelog", server.uri()));
        target.app_store_urls = Some(BTreeMap::from([(
            "ios".to_string(),
            format!("{}/ios", server.uri()),
        )]));

        let monitor = monitor_for(&server, vec![target]).await;
        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();

        let changelog = cycle
            .results
            .iter()
            .find(|r| r.kind == ContentKind::Changelog)
            .unwrap();
        assert_eq!(changelog.metadata["keyword_hits"]["feature"], 2);
        assert_eq!(changelog.metadata["keyword_hits"]["release"], 1);

        let app = cycle
            .results
            .iter()
            .find(|r| r.kind == ContentKind::AppStore)
            .unwrap();
        assert_eq!(app.metadata["platform"], "ios");
        assert!(
            monitor
                .storage()
                .get_history(&history_key("Acme", ContentKind::AppStore, Some("ios")))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn feeds_become_one_blog_result() {
        let server = MockServer::start().await;
        mount_page(&server, "/", HOME).await;
        let now = Utc::now().to_rfc2822();
        let rss = format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Acme</title>
               <item><title>Launch week</title><description>Five launches</description>
               <link>https://acme.test/launch</link><pubDate>{now}</pubDate></item>
               </channel></rss>"#
        );
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss))
            .mount(&server)
            .await;
        mount_default_completion(&server, "Summary").await;

        let feed_url = format!("{}/feed.xml", server.uri());
        let mut target = Target::new("Acme", format!("{}/", server.uri()));
        target.rss_feeds = Some(vec![feed_url.clone()]);

        let monitor = monitor_for(&server, vec![target]).await;
        let cycle = monitor.run_cycle(&SilentProgress).await.unwrap();

        let feed = cycle.results.last().unwrap();
        assert_eq!(feed.kind, ContentKind::Blog);
        assert_eq!(feed.url, feed_url);
        assert_eq!(feed.metadata["entry_count"], 1);
        assert!(feed.raw_content.starts_with("Title: Launch week\nSummary: Five launches"));
        // feeds have no history snapshot
        assert_eq!(monitor.storage().count_history().await.unwrap(), 1);
    }
}

//! End-to-end runs: monitor → summarize → notify → report file.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{info, instrument, warn};

use lookout_crawler::PageFetcher;
use lookout_shared::{ChannelKind, Credentials, MonitorConfig, Result, RunId, Target};
use lookout_storage::Storage;

use crate::analysis::Analyst;
use crate::llm::OpenAiClient;
use crate::monitor::{CycleOutcome, Monitor};
use crate::notify::{Delivery, DeliveryOutcome, NotifierSet};
use crate::report::{Reporter, render_report, write_report};

const REPORT_HEADING: &str = "Competitive Intelligence Report";
const REPORT_PREFIX: &str = "competitive_report";
const RUN_HEADING: &str = "Competitor Monitoring Run";
const RUN_PREFIX: &str = "monitor_run";

/// Result of [`Pipeline::run_report`] or [`Pipeline::run_once`].
#[derive(Debug)]
pub struct ReportOutcome {
    pub run_id: RunId,
    pub result_count: usize,
    pub failed_targets: Vec<String>,
    /// `None` when the cycle produced no results.
    pub report_path: Option<PathBuf>,
    pub deliveries: Vec<(ChannelKind, DeliveryOutcome)>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each target is monitored.
    fn target_started(&self, name: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &ReportOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn target_started(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _outcome: &ReportOutcome) {}
}

/// Monitor, reporter and notifiers wired together.
pub struct Pipeline {
    monitor: Monitor,
    reporter: Reporter,
    notifiers: NotifierSet,
}

impl Pipeline {
    pub fn new(monitor: Monitor, reporter: Reporter, notifiers: NotifierSet) -> Self {
        Self {
            monitor,
            reporter,
            notifiers,
        }
    }

    /// Wire a pipeline from loaded config, targets and credentials.
    ///
    /// Fails when `OPENAI_API_KEY` is missing.
    pub fn from_config(
        config: MonitorConfig,
        targets: Vec<Target>,
        credentials: &Credentials,
        storage: Storage,
    ) -> Result<Self> {
        let client = OpenAiClient::from_credentials(credentials)?;
        let fetcher = PageFetcher::new(&config)?;
        let analyst = Analyst::new(client.clone(), &config);
        let reporter = Reporter::new(client, &config);
        let notifiers = NotifierSet::from_config(&config, credentials)?;
        let monitor = Monitor::new(config, targets, fetcher, analyst, storage);
        Ok(Self::new(monitor, reporter, notifiers))
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Full report run: cycle, summary, notifications, then a detailed report file.
    ///
    /// Nothing is summarized, sent or written when the cycle yields no results.
    #[instrument(skip_all, fields(targets = self.monitor.targets().len()))]
    pub async fn run_report(&self, progress: &dyn ProgressReporter) -> Result<ReportOutcome> {
        let start = Instant::now();

        progress.phase("Monitoring targets");
        let cycle = self.monitor.run_cycle(progress).await?;
        if cycle.results.is_empty() {
            warn!(run_id = %cycle.run_id, "no results collected, skipping report generation");
            return Ok(finish(cycle, None, Vec::new(), start, progress));
        }

        progress.phase("Generating summary");
        let summary = self.reporter.summarize(&cycle.results).await;
        let now = Local::now().naive_local();

        progress.phase("Sending notifications");
        let deliveries = self
            .notifiers
            .dispatch(&Delivery::new(summary.as_str(), &cycle.results, now))
            .await;

        progress.phase("Writing report");
        let markdown = render_report(REPORT_HEADING, &summary, Some(&cycle.results), now);
        let path = self.write(&cycle.run_id, REPORT_PREFIX, &markdown, now).await?;

        Ok(finish(cycle, Some(path), deliveries, start, progress))
    }

    /// One-off run: cycle, summary-only report file, then notifications to
    /// configured channels.
    #[instrument(skip_all, fields(targets = self.monitor.targets().len()))]
    pub async fn run_once(&self, progress: &dyn ProgressReporter) -> Result<ReportOutcome> {
        let start = Instant::now();

        progress.phase("Monitoring targets");
        let cycle = self.monitor.run_cycle(progress).await?;
        if cycle.results.is_empty() {
            warn!(run_id = %cycle.run_id, "no results collected during monitoring");
            return Ok(finish(cycle, None, Vec::new(), start, progress));
        }

        progress.phase("Generating summary");
        let summary = self.reporter.summarize(&cycle.results).await;
        let now = Local::now().naive_local();

        progress.phase("Writing report");
        let markdown = render_report(RUN_HEADING, &summary, None, now);
        let path = self.write(&cycle.run_id, RUN_PREFIX, &markdown, now).await?;

        progress.phase("Sending notifications");
        let deliveries = self
            .notifiers
            .dispatch(&Delivery::new(summary.as_str(), &cycle.results, now))
            .await
            .into_iter()
            .filter(|(_, outcome)| !matches!(outcome, DeliveryOutcome::Skipped(_)))
            .collect();

        Ok(finish(cycle, Some(path), deliveries, start, progress))
    }

    async fn write(
        &self,
        run_id: &RunId,
        prefix: &str,
        markdown: &str,
        now: chrono::NaiveDateTime,
    ) -> Result<PathBuf> {
        let path = write_report(&self.monitor.config().reports_dir, prefix, markdown, now)?;
        self.monitor
            .storage()
            .set_run_report(run_id, &path.display().to_string())
            .await?;
        Ok(path)
    }
}

fn finish(
    cycle: CycleOutcome,
    report_path: Option<PathBuf>,
    deliveries: Vec<(ChannelKind, DeliveryOutcome)>,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> ReportOutcome {
    let outcome = ReportOutcome {
        run_id: cycle.run_id,
        result_count: cycle.results.len(),
        failed_targets: cycle.failed_targets,
        report_path,
        deliveries,
        elapsed: start.elapsed(),
    };
    info!(
        run_id = %outcome.run_id,
        results = outcome.result_count,
        report = ?outcome.report_path,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "pipeline finished"
    );
    progress.done(&outcome);
    outcome
}

//! Executive summaries and markdown report files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};

use lookout_crawler::truncate_chars;
use lookout_shared::{LookoutError, MonitorConfig, MonitoringResult, Result};

use crate::llm::{ChatRequest, Message, OpenAiClient};

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a senior competitive intelligence analyst creating executive summaries.";

/// Returned instead of a summary when a cycle produced nothing.
pub const EMPTY_SUMMARY: &str = "No monitoring results available for this week.";

/// Per-result summary excerpt in the summary prompt.
const PROMPT_EXCERPT_CHARS: usize = 200;
/// Per-result summary excerpt in the fallback summary.
const FALLBACK_EXCERPT_CHARS: usize = 150;

/// Headline numbers for a set of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportStats {
    /// Distinct target names.
    pub companies_monitored: usize,
    /// Sum of detected changes over every result.
    pub changes_detected: usize,
}

impl ReportStats {
    pub fn from_results(results: &[MonitoringResult]) -> Self {
        let companies: HashSet<&str> = results.iter().map(|r| r.target_name.as_str()).collect();
        Self {
            companies_monitored: companies.len(),
            changes_detected: results.iter().map(|r| r.detected_changes.len()).sum(),
        }
    }
}

/// Produces the executive summary for a cycle.
#[derive(Clone)]
pub struct Reporter {
    client: OpenAiClient,
    model: String,
}

impl Reporter {
    pub fn new(client: OpenAiClient, config: &MonitorConfig) -> Self {
        Self {
            client,
            model: config.ai_model.clone(),
        }
    }

    /// Ask the model for an executive summary, falling back to
    /// [`fallback_summary`] when the call fails.
    #[instrument(skip_all, fields(results = results.len()))]
    pub async fn summarize(&self, results: &[MonitoringResult]) -> String {
        if results.is_empty() {
            return EMPTY_SUMMARY.to_string();
        }

        let request = ChatRequest::new(&self.model)
            .message(Message::system(SUMMARY_SYSTEM_PROMPT))
            .message(Message::user(summary_prompt(results)))
            .temperature(0.3);

        match self.client.chat(&request).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "AI summary failed, using fallback");
                fallback_summary(results)
            }
        }
    }
}

/// Build the executive-summary prompt.
pub fn summary_prompt(results: &[MonitoringResult]) -> String {
    let lines = results
        .iter()
        .map(|r| {
            format!(
                "Company: {}, Type: {}, Changes: {}, Summary: {}...",
                r.target_name,
                r.kind,
                r.detected_changes.len(),
                truncate_chars(&r.ai_summary, PROMPT_EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Generate a comprehensive weekly competitive intelligence summary based on the \
         following monitoring results:\n\n\
         {lines}\n\n\
         Structure the summary with:\n\
         1. Executive Summary - key highlights across all competitors\n\
         2. New Features & Product Updates by company\n\
         3. Pricing Changes detected\n\
         4. Strategic Messaging Shifts\n\
         5. Competitive Implications and Recommendations\n\n\
         Make it actionable for business decision makers."
    )
}

/// Deterministic markdown summary grouped by company in first-seen order.
pub fn fallback_summary(results: &[MonitoringResult]) -> String {
    if results.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }

    let mut companies: Vec<(&str, Vec<&MonitoringResult>)> = Vec::new();
    for result in results {
        let name = result.target_name.as_str();
        match companies.iter().position(|(seen, _)| *seen == name) {
            Some(i) => companies[i].1.push(result),
            None => companies.push((name, vec![result])),
        }
    }

    let mut summary = String::from("# Weekly Competitive Intelligence Summary\n\n");
    for (company, group) in companies {
        summary.push_str(&format!("## {company}\n"));
        for result in group {
            let status = match result.detected_changes.len() {
                0 => "No changes detected".to_string(),
                n => format!("{n} changes detected"),
            };
            summary.push_str(&format!("- **{}**: {status}\n", result.kind.title()));
            summary.push_str(&format!(
                "  {}...\n\n",
                truncate_chars(&result.ai_summary, FALLBACK_EXCERPT_CHARS)
            ));
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Report files
// ---------------------------------------------------------------------------

/// Render a report document.
///
/// With `details`, a `## Detailed Results` section lists every result.
pub fn render_report(
    heading: &str,
    summary: &str,
    details: Option<&[MonitoringResult]>,
    generated_at: NaiveDateTime,
) -> String {
    let mut out = format!(
        "# {heading}\nGenerated: {}\n\n{summary}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(results) = details {
        out.push_str("\n\n## Detailed Results\n\n");
        for r in results {
            out.push_str(&format!(
                "### {} - {}\nURL: {}\nTimestamp: {}\nChanges: {}\nSummary: {}\n\n",
                r.target_name,
                r.kind.title(),
                r.url,
                r.timestamp.to_rfc3339(),
                r.detected_changes.len(),
                r.ai_summary
            ));
        }
    }
    out
}

/// Write `markdown` to `<dir>/<prefix>_YYYYmmdd_HHMMSS.md`, creating `dir`.
pub fn write_report(
    dir: &Path,
    prefix: &str,
    markdown: &str,
    now: NaiveDateTime,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| LookoutError::io(dir, e))?;
    let path = dir.join(format!("{prefix}_{}.md", now.format("%Y%m%d_%H%M%S")));
    std::fs::write(&path, markdown).map_err(|e| LookoutError::io(&path, e))?;
    info!(path = %path.display(), "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wiremock::MockServer;

    use super::*;
    use crate::test_support::{mount_default_completion, result, temp_dir};
    use lookout_shared::ContentKind;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn sample() -> Vec<MonitoringResult> {
        vec![
            result("Acme", ContentKind::Pricing, &["a", "b"]),
            result("Globex", ContentKind::Blog, &[]),
            result("Acme", ContentKind::Changelog, &[]),
        ]
    }

    #[test]
    fn stats_count_distinct_companies_and_changes() {
        let stats = ReportStats::from_results(&sample());
        assert_eq!(stats.companies_monitored, 2);
        assert_eq!(stats.changes_detected, 2);
        assert_eq!(ReportStats::from_results(&[]), ReportStats::default());
    }

    #[test]
    fn prompt_lists_every_result() {
        let prompt = summary_prompt(&sample());
        assert!(prompt.contains("Company: Acme, Type: pricing, Changes: 2, Summary: Acme Pricing summary..."));
        assert!(prompt.contains("Company: Globex, Type: blog, Changes: 0"));
        assert!(prompt.ends_with("Make it actionable for business decision makers."));
    }

    #[test]
    fn fallback_groups_by_company_in_order() {
        let summary = fallback_summary(&sample());
        assert!(summary.starts_with("# Weekly Competitive Intelligence Summary\n\n## Acme\n"));
        assert!(summary.contains("- **Pricing**: 2 changes detected\n  Acme Pricing summary...\n\n"));
        assert!(summary.contains("- **Changelog**: No changes detected\n"));
        let acme = summary.find("## Acme").unwrap();
        let globex = summary.find("## Globex").unwrap();
        assert!(acme < globex);
        assert_eq!(summary.matches("## Acme").count(), 1);
    }

    #[test]
    fn fallback_truncates_long_summaries() {
        let mut r = result("Acme", ContentKind::Website, &[]);
        r.ai_summary = "x".repeat(400);
        let summary = fallback_summary(&[r]);
        assert!(summary.contains(&format!("  {}...", "x".repeat(150))));
        assert!(!summary.contains(&"x".repeat(151)));
    }

    #[test]
    fn empty_results_have_a_fixed_summary() {
        assert_eq!(fallback_summary(&[]), EMPTY_SUMMARY);
    }

    #[test]
    fn report_has_header_and_details() {
        let md = render_report(
            "Competitive Intelligence Report",
            "All quiet.",
            Some(&sample()),
            at(9, 0, 5),
        );
        assert!(md.starts_with(
            "# Competitive Intelligence Report\nGenerated: 2024-06-10 09:00:05\n\nAll quiet.\n\n## Detailed Results\n\n"
        ));
        assert!(md.contains("### Acme - Pricing\nURL: https://acme.test/pricing\n"));
        assert!(md.contains("Changes: 2\nSummary: Acme Pricing summary\n\n"));
        assert_eq!(md.matches("### ").count(), 3);
    }

    #[test]
    fn summary_only_report_has_no_details() {
        let md = render_report("Competitor Monitoring Run", "Short.", None, at(9, 0, 0));
        assert_eq!(md, "# Competitor Monitoring Run\nGenerated: 2024-06-10 09:00:00\n\nShort.");
    }

    #[test]
    fn write_report_names_file_by_timestamp() {
        let dir = temp_dir("lookout-reports");
        let path = write_report(&dir, "competitive_report", "# hi", at(14, 3, 7)).unwrap();
        assert_eq!(path, dir.join("competitive_report_20240610_140307.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn summarize_uses_model_reply() {
        let server = MockServer::start().await;
        mount_default_completion(&server, "## Executive Summary\nAcme raised prices.").await;

        let client = OpenAiClient::new("sk").unwrap().with_base_url(server.uri());
        let reporter = Reporter::new(client, &MonitorConfig::default());
        let summary = reporter.summarize(&sample()).await;
        assert_eq!(summary, "## Executive Summary\nAcme raised prices.");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["messages"][0]["content"], SUMMARY_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn summarize_falls_back_on_error() {
        // nothing listens on port 1
        let client = OpenAiClient::new("sk").unwrap().with_base_url("http://127.0.0.1:1");
        let reporter = Reporter::new(client, &MonitorConfig::default());
        let summary = reporter.summarize(&sample()).await;
        assert_eq!(summary, fallback_summary(&sample()));
    }
}

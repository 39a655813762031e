//! Per-channel LLM analysis and change detection.
//!
//! Each scraped channel gets a kind-specific prompt. When a previous
//! snapshot exists its text is appended for comparison, and if the content
//! hash moved a second, cheaper call lists the concrete differences.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, instrument};

use lookout_crawler::{compute_hash, truncate_chars};
use lookout_shared::{ContentKind, HistoryRecord, MonitorConfig, Result};

use crate::llm::{ChatRequest, Message, OpenAiClient};

/// First entry of `detected_changes` whenever a snapshot's hash changed.
pub const CHANGE_NOTE: &str = "Content updated since last monitoring";

const ANALYST_SYSTEM_PROMPT: &str = "You are a competitive intelligence analyst. \
     Provide clear, actionable insights about competitor activities.";

/// Characters of each version sent to the change-listing call.
const CHANGE_EXCERPT_CHARS: usize = 1000;

/// Output of analyzing one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub ai_summary: String,
    pub detected_changes: Vec<String>,
}

/// Runs analysis prompts against the configured models.
#[derive(Clone)]
pub struct Analyst {
    client: OpenAiClient,
    ai_model: String,
    change_model: String,
}

impl Analyst {
    pub fn new(client: OpenAiClient, config: &MonitorConfig) -> Self {
        Self {
            client,
            ai_model: config.ai_model.clone(),
            change_model: config.change_model.clone(),
        }
    }

    /// Summarize `content` and, against `previous`, list what changed.
    ///
    /// Any failed completion fails the whole analysis.
    #[instrument(skip_all, fields(kind = %kind, has_previous = previous.is_some()))]
    pub async fn analyze(
        &self,
        content: &str,
        kind: ContentKind,
        previous: Option<&HistoryRecord>,
    ) -> Result<Analysis> {
        let prompt = analysis_prompt(content, kind, previous.map(|p| p.content.as_str()));
        let request = ChatRequest::new(&self.ai_model)
            .message(Message::system(ANALYST_SYSTEM_PROMPT))
            .message(Message::user(prompt))
            .temperature(0.3);
        let ai_summary = self.client.chat(&request).await?;

        let mut detected_changes = Vec::new();
        if let Some(previous) = previous.filter(|p| p.hash != compute_hash(content)) {
            debug!(key = %previous.key, "content hash changed");
            detected_changes.push(CHANGE_NOTE.to_string());

            let request = ChatRequest::new(&self.change_model)
                .message(Message::user(change_prompt(&previous.content, content)))
                .temperature(0.1);
            detected_changes.push(self.client.chat(&request).await?);
        }

        Ok(Analysis {
            ai_summary,
            detected_changes,
        })
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// Build the analysis prompt for a channel kind.
pub fn analysis_prompt(content: &str, kind: ContentKind, previous: Option<&str>) -> String {
    let mut prompt = match kind {
        ContentKind::Changelog => format!(
            "Analyze this changelog/release notes content and identify:\n\
             1. New features announced\n\
             2. Product updates or improvements\n\
             3. Pricing changes mentioned\n\
             4. Deprecated features\n\
             5. Key technical updates\n\n\
             Content: {content}\n\n\
             Provide a structured summary with clear categories."
        ),
        ContentKind::Pricing => format!(
            "Analyze this pricing page content and identify:\n\
             1. Current pricing tiers and costs\n\
             2. Any pricing changes or updates\n\
             3. New plans or features\n\
             4. Special offers or promotions\n\
             5. Comparison with competitors mentioned\n\n\
             Content: {content}\n\n\
             Focus on extracting specific pricing information and any changes."
        ),
        ContentKind::Blog => format!(
            "Analyze this blog content and identify:\n\
             1. Product announcements\n\
             2. Company updates or news\n\
             3. New features or capabilities discussed\n\
             4. Strategic direction or messaging changes\n\
             5. Customer success stories or case studies\n\n\
             Content: {content}\n\n\
             Summarize the key business and product insights."
        ),
        ContentKind::Website | ContentKind::Social | ContentKind::AppStore => format!(
            "Analyze this {kind} content and identify:\n\
             1. Key messaging and positioning\n\
             2. New features or products mentioned\n\
             3. Pricing information\n\
             4. Company updates or announcements\n\
             5. Competitive positioning\n\n\
             Content: {content}\n\n\
             Provide insights on business strategy and product updates."
        ),
    };

    if let Some(previous) = previous.filter(|p| !p.is_empty()) {
        prompt.push_str(&format!(
            "\n\nPrevious content for comparison: {previous}\n\n\
             Highlight what has changed between the previous and current content."
        ));
    }

    prompt
}

/// Build the prompt asking for the concrete differences between two versions.
pub fn change_prompt(previous: &str, current: &str) -> String {
    format!(
        "Compare these two versions and list specific changes:\n\n\
         Previous: {}\n\
         Current: {}\n\n\
         List only the specific changes found.",
        truncate_chars(previous, CHANGE_EXCERPT_CHARS),
        truncate_chars(current, CHANGE_EXCERPT_CHARS),
    )
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// Keywords tracked for a channel kind.
pub fn keywords_for(kind: ContentKind, config: &MonitorConfig) -> &[String] {
    match kind {
        ContentKind::Changelog => &config.changelog_keywords,
        ContentKind::Pricing => &config.pricing_keywords,
        _ => &[],
    }
}

/// Case-insensitive whole-word counts of each keyword that occurs in `content`.
pub fn keyword_hits(content: &str, keywords: &[String]) -> BTreeMap<String, usize> {
    keywords
        .iter()
        .filter_map(|kw| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).ok()?;
            let count = re.find_iter(content).count();
            (count > 0).then(|| (kw.to_lowercase(), count))
        })
        .collect()
}

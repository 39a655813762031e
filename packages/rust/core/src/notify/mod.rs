//! Delivery of finished summaries to Slack, Notion, email and webhooks.
//!
//! Every configured channel is attempted independently; one failing channel
//! never stops the others, and [`NotifierSet::dispatch`] itself cannot fail.

mod email;
mod notion;
mod slack;
mod webhook;

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::Client;
use tracing::{info, instrument, warn};

use lookout_shared::{ChannelKind, Credentials, LookoutError, MonitorConfig, MonitoringResult, Result};

use crate::report::ReportStats;

pub use email::EmailNotifier;
pub use notion::{NotionNotifier, chunk_text};
pub use slack::SlackNotifier;
pub use webhook::WebhookNotifier;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// What gets delivered: one summary plus its headline numbers.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub summary: String,
    pub stats: ReportStats,
    pub generated_at: NaiveDateTime,
}

impl Delivery {
    pub fn new(summary: impl Into<String>, results: &[MonitoringResult], generated_at: NaiveDateTime) -> Self {
        Self {
            summary: summary.into(),
            stats: ReportStats::from_results(results),
            generated_at,
        }
    }

    /// Page/subject title, e.g. `Competitive Intelligence Report - 2024-06-10`.
    pub fn title(&self) -> String {
        format!(
            "Competitive Intelligence Report - {}",
            self.generated_at.format("%Y-%m-%d")
        )
    }
}

/// Per-channel result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// Channel requested but not configured.
    Skipped(String),
    Failed(String),
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// A ready-to-use delivery channel.
pub enum Notifier {
    Slack(SlackNotifier),
    Notion(NotionNotifier),
    Email(EmailNotifier),
    Webhook(WebhookNotifier),
}

impl Notifier {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Self::Slack(_) => ChannelKind::Slack,
            Self::Notion(_) => ChannelKind::Notion,
            Self::Email(_) => ChannelKind::Email,
            Self::Webhook(_) => ChannelKind::Webhook,
        }
    }

    pub async fn send(&self, delivery: &Delivery) -> Result<()> {
        match self {
            Self::Slack(n) => n.send(delivery).await,
            Self::Notion(n) => n.send(delivery).await,
            Self::Email(n) => n.send(delivery).await,
            Self::Webhook(n) => n.send(delivery).await,
        }
    }
}

enum Slot {
    Ready(Notifier),
    Skipped(ChannelKind, String),
    /// Credentials present but unusable; reported as a failed delivery.
    Broken(ChannelKind, String),
}

/// The channels named in `notification_channels`, in config order.
pub struct NotifierSet {
    slots: Vec<Slot>,
}

impl NotifierSet {
    /// Build notifiers for every requested channel that has credentials.
    ///
    /// Channels without credentials are kept as skipped so they show up in
    /// the dispatch outcome. A channel whose settings cannot be used (say a
    /// malformed `EMAIL_TO`) fails on its own at dispatch time.
    pub fn from_config(config: &MonitorConfig, credentials: &Credentials) -> Result<Self> {
        let client = http_client()?;
        let mut slots = Vec::new();
        let mut seen = Vec::new();

        for &kind in &config.notification_channels {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);

            let slot = match build_notifier(kind, credentials, &client) {
                Ok(Some(notifier)) => Slot::Ready(notifier),
                Ok(None) => Slot::Skipped(kind, missing_credentials(kind).to_string()),
                Err(e) => {
                    warn!(channel = %kind, error = %e, "notification channel misconfigured");
                    Slot::Broken(kind, e.to_string())
                }
            };
            slots.push(slot);
        }

        Ok(Self { slots })
    }

    /// A set holding exactly `notifiers`.
    pub fn from_notifiers(notifiers: Vec<Notifier>) -> Self {
        Self {
            slots: notifiers.into_iter().map(Slot::Ready).collect(),
        }
    }

    /// Channels that will actually be attempted.
    pub fn ready(&self) -> Vec<ChannelKind> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::Ready(n) => Some(n.kind()),
                Slot::Skipped(..) | Slot::Broken(..) => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Send `delivery` on every channel and report what happened to each.
    #[instrument(skip_all, fields(channels = self.slots.len()))]
    pub async fn dispatch(&self, delivery: &Delivery) -> Vec<(ChannelKind, DeliveryOutcome)> {
        let mut outcomes = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            let outcome = match slot {
                Slot::Skipped(kind, reason) => {
                    warn!(channel = %kind, %reason, "notification channel not configured");
                    (*kind, DeliveryOutcome::Skipped(reason.clone()))
                }
                Slot::Broken(kind, reason) => (*kind, DeliveryOutcome::Failed(reason.clone())),
                Slot::Ready(notifier) => match notifier.send(delivery).await {
                    Ok(()) => {
                        info!(channel = %notifier.kind(), "summary delivered");
                        (notifier.kind(), DeliveryOutcome::Sent)
                    }
                    Err(e) => {
                        warn!(channel = %notifier.kind(), error = %e, "delivery failed");
                        (notifier.kind(), DeliveryOutcome::Failed(e.to_string()))
                    }
                },
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

fn build_notifier(kind: ChannelKind, creds: &Credentials, client: &Client) -> Result<Option<Notifier>> {
    let notifier = match kind {
        ChannelKind::Slack => creds.slack_bot_token.as_ref().map(|token| {
            Notifier::Slack(SlackNotifier::new(client.clone(), token, &creds.slack_channel))
        }),
        ChannelKind::Notion => match (&creds.notion_token, &creds.notion_database_id) {
            (Some(token), Some(db)) => {
                Some(Notifier::Notion(NotionNotifier::new(client.clone(), token, db)))
            }
            _ => None,
        },
        ChannelKind::Email => match &creds.smtp {
            Some(smtp) => Some(Notifier::Email(EmailNotifier::new(smtp)?)),
            None => None,
        },
        ChannelKind::Webhook => creds
            .webhook_url
            .as_ref()
            .map(|url| Notifier::Webhook(WebhookNotifier::new(client.clone(), url))),
    };
    Ok(notifier)
}

fn missing_credentials(kind: ChannelKind) -> &'static str {
    match kind {
        ChannelKind::Slack => "SLACK_BOT_TOKEN not set",
        ChannelKind::Notion => "NOTION_TOKEN or NOTION_DATABASE_ID not set",
        ChannelKind::Email => "SMTP_HOST, EMAIL_FROM or EMAIL_TO not set",
        ChannelKind::Webhook => "WEBHOOK_URL not set",
    }
}

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| LookoutError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a non-2xx reply to a notify error carrying a body excerpt.
async fn check_status(channel: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LookoutError::notify(
        channel,
        format!("HTTP {status}: {}", body.chars().take(300).collect::<String>()),
    ))
}

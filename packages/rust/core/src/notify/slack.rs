use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use lookout_crawler::truncate_chars;
use lookout_shared::{LookoutError, Result};

use super::{Delivery, check_status};

const SLACK_API: &str = "https://slack.com/api";
/// Slack rejects section text longer than this.
const SECTION_LIMIT: usize = 3000;

/// Posts the summary with `chat.postMessage`.
pub struct SlackNotifier {
    client: Client,
    token: String,
    channel: String,
    base_url: String,
}

#[derive(Deserialize)]
struct SlackReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(client: Client, token: &str, channel: &str) -> Self {
        Self {
            client,
            token: token.to_string(),
            channel: channel.to_string(),
            base_url: SLACK_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn send(&self, delivery: &Delivery) -> Result<()> {
        let body = json!({
            "channel": self.channel,
            "text": delivery.title(),
            "blocks": blocks(delivery),
        });

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LookoutError::notify("slack", e.to_string()))?;
        let response = check_status("slack", response).await?;

        // Slack answers 200 even for rejected messages.
        let reply: SlackReply = response
            .json()
            .await
            .map_err(|e| LookoutError::notify("slack", format!("malformed reply: {e}")))?;
        if !reply.ok {
            return Err(LookoutError::notify(
                "slack",
                reply.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }
        Ok(())
    }
}

/// Header, summary section and a stats context line.
pub(crate) fn blocks(delivery: &Delivery) -> Value {
    json!([
        {
            "type": "header",
            "text": { "type": "plain_text", "text": "Weekly Competitive Intelligence Report" }
        },
        {
            "type": "section",
            "text": { "type": "mrkdwn", "text": truncate_chars(&delivery.summary, SECTION_LIMIT) }
        },
        {
            "type": "context",
            "elements": [{
                "type": "mrkdwn",
                "text": format!(
                    "Monitored {} companies | {} changes detected | Generated on {}",
                    delivery.stats.companies_monitored,
                    delivery.stats.changes_detected,
                    delivery.generated_at.format("%Y-%m-%d %H:%M"),
                )
            }]
        }
    ])
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notify::tests::delivery;

    fn notifier(server: &MockServer) -> SlackNotifier {
        SlackNotifier::new(Client::new(), "xoxb-test", "#intel").with_base_url(server.uri())
    }

    #[test]
    fn blocks_carry_stats_and_truncated_summary() {
        let mut d = delivery();
        d.summary = "s".repeat(3500);
        let blocks = blocks(&d);
        assert_eq!(blocks[0]["type"], "header");
        assert_eq!(blocks[1]["text"]["text"].as_str().unwrap().len(), 3000);
        assert_eq!(
            blocks[2]["elements"][0]["text"],
            "Monitored 2 companies | 3 changes detected | Generated on 2024-06-10 09:00"
        );
    }

    #[tokio::test]
    async fn posts_to_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(json!({ "channel": "#intel" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).send(&delivery()).await.unwrap();
    }

    #[tokio::test]
    async fn not_ok_reply_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "channel_not_found" })),
            )
            .mount(&server)
            .await;

        let err = notifier(&server).send(&delivery()).await.unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
        assert!(err.to_string().contains("slack"));
    }
}

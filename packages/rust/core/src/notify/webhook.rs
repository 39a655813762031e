use reqwest::Client;
use serde::Serialize;

use lookout_shared::{LookoutError, Result};

use super::{Delivery, check_status};

/// POSTs the summary as JSON to an arbitrary URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct WebhookPayload<'a> {
    title: String,
    generated_at: String,
    companies_monitored: usize,
    changes_detected: usize,
    summary: &'a str,
}

impl<'a> WebhookPayload<'a> {
    pub(crate) fn new(delivery: &'a Delivery) -> Self {
        Self {
            title: delivery.title(),
            generated_at: delivery.generated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            companies_monitored: delivery.stats.companies_monitored,
            changes_detected: delivery.stats.changes_detected,
            summary: &delivery.summary,
        }
    }
}

impl WebhookNotifier {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub async fn send(&self, delivery: &Delivery) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::new(delivery))
            .send()
            .await
            .map_err(|e| LookoutError::notify("webhook", e.to_string()))?;
        check_status("webhook", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notify::tests::delivery;

    #[tokio::test]
    async fn posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({
                "title": "Competitive Intelligence Report - 2024-06-10",
                "generated_at": "2024-06-10T09:00:00",
                "companies_monitored": 2,
                "changes_detected": 3,
                "summary": "Weekly summary"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        WebhookNotifier::new(Client::new(), &format!("{}/hook", server.uri()))
            .send(&delivery())
            .await
            .unwrap();
    }
}

use reqwest::Client;
use serde_json::{Value, json};

use lookout_shared::{LookoutError, Result};

use super::{Delivery, check_status};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
/// Maximum characters in one rich-text object.
const RICH_TEXT_LIMIT: usize = 2000;
/// Maximum children in a page-create request.
const MAX_BLOCKS: usize = 100;

/// Creates one page per report in a Notion database.
pub struct NotionNotifier {
    client: Client,
    token: String,
    database_id: String,
    base_url: String,
}

impl NotionNotifier {
    pub fn new(client: Client, token: &str, database_id: &str) -> Self {
        Self {
            client,
            token: token.to_string(),
            database_id: database_id.to_string(),
            base_url: NOTION_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn send(&self, delivery: &Delivery) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&page_body(&self.database_id, delivery))
            .send()
            .await
            .map_err(|e| LookoutError::notify("notion", e.to_string()))?;
        check_status("notion", response).await?;
        Ok(())
    }
}

pub(crate) fn page_body(database_id: &str, delivery: &Delivery) -> Value {
    let children: Vec<Value> = chunk_text(&delivery.summary, RICH_TEXT_LIMIT)
        .into_iter()
        .take(MAX_BLOCKS)
        .map(|chunk| {
            json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [{ "type": "text", "text": { "content": chunk } }]
                }
            })
        })
        .collect();

    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "Title": { "title": [{ "text": { "content": delivery.title() } }] },
            "Date": { "date": { "start": delivery.generated_at.format("%Y-%m-%dT%H:%M:%S").to_string() } },
            "Companies Monitored": { "number": delivery.stats.companies_monitored },
            "Changes Detected": { "number": delivery.stats.changes_detected }
        },
        "children": children
    })
}

/// Split `text` into pieces of at most `limit` characters.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

//! Helpers shared by this crate's tests.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lookout_crawler::PageFetcher;
use lookout_shared::{ContentKind, MonitorConfig, MonitoringResult, Target};
use lookout_storage::Storage;

use crate::analysis::Analyst;
use crate::llm::OpenAiClient;
use crate::monitor::Monitor;
use crate::notify::NotifierSet;
use crate::pipeline::Pipeline;
use crate::report::Reporter;

/// A chat-completions response body carrying `text`.
pub(crate) fn completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

/// Answer completions whose body contains `needle` with `reply`.
/// Mounted at a higher priority than [`mount_default_completion`].
pub(crate) async fn mount_completion_for(server: &MockServer, needle: &str, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Answer every other completion with `reply`.
pub(crate) async fn mount_default_completion(server: &MockServer, reply: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .mount(server)
        .await;
}

/// Serve `body` as HTML at `route`.
pub(crate) async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Fresh database in the temp directory.
pub(crate) async fn temp_storage() -> Storage {
    let path = std::env::temp_dir().join(format!("lookout_core_{}.db", Uuid::now_v7()));
    Storage::open(&path).await.expect("open temp db")
}

/// A pipeline watching one target (`Acme`, the server's homepage) with the
/// AI endpoint also pointed at `server`.
pub(crate) async fn test_pipeline(
    server: &MockServer,
    reports: std::path::PathBuf,
    notifiers: NotifierSet,
) -> Pipeline {
    let config = MonitorConfig {
        reports_dir: reports,
        ..MonitorConfig::default()
    };
    let fetcher = PageFetcher::with_private_hosts(&config).unwrap();
    let client = OpenAiClient::new("sk").unwrap().with_base_url(server.uri());
    let analyst = Analyst::new(client.clone(), &config);
    let reporter = Reporter::new(client, &config);
    let targets = vec![Target::new("Acme", format!("{}/", server.uri()))];
    let monitor = Monitor::new(config, targets, fetcher, analyst, temp_storage().await);
    Pipeline::new(monitor, reporter, notifiers)
}

/// A unique scratch directory path (not created).
pub(crate) fn temp_dir(prefix: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{prefix}-{}", Uuid::now_v7()))
}

pub(crate) fn result(target: &str, kind: ContentKind, changes: &[&str]) -> MonitoringResult {
    MonitoringResult {
        timestamp: Utc::now(),
        target_name: target.into(),
        kind,
        url: format!("https://{}.test/{}", target.to_lowercase(), kind),
        content_hash: "hash".into(),
        raw_content: "content".into(),
        ai_summary: format!("{target} {} summary", kind.title()),
        detected_changes: changes.iter().map(|c| c.to_string()).collect(),
        metadata: BTreeMap::new(),
    }
}

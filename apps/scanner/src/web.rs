//! axum web UI: upload a scan, see the classification, export it.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lookout_scanner::samples::{generate, to_png};
use lookout_scanner::{
    Classifier, DISCLAIMER, Prediction, SampleKind, classify_bytes, render_export, tumor_info,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Uploads larger than this are rejected before decoding.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    classifier: Arc<dyn Classifier>,
}

pub(crate) fn router(classifier: Arc<dyn Classifier>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/analyze/export", post(export))
        .route("/sample/:kind", get(sample))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { classifier })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

enum WebError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        let body = format!(
            "<h2>Could not analyze image</h2><p class=\"error\">{}</p><p><a href=\"/\">Back</a></p>",
            escape(&message)
        );
        (status, Html(page(&body))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<String> {
    Html(page(UPLOAD_FORM))
}

async fn analyze(State(state): State<AppState>, multipart: Multipart) -> Result<Html<String>, WebError> {
    let upload = read_upload(multipart).await?;
    let prediction = classify(&state, upload.bytes).await?;
    Ok(Html(page(&result_html(&prediction, &upload.label))))
}

async fn export(State(state): State<AppState>, multipart: Multipart) -> Result<Response, WebError> {
    let upload = read_upload(multipart).await?;
    let prediction = classify(&state, upload.bytes).await?;
    let body = render_export(&prediction, &upload.label);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"brain_tumor_analysis.txt\"",
            ),
        ],
        body,
    )
        .into_response())
}

async fn sample(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Html<String>, WebError> {
    let kind = kind
        .parse::<SampleKind>()
        .map_err(|e| WebError::BadRequest(e.to_string()))?;
    let png = to_png(&generate(kind, None)).map_err(|e| WebError::Internal(e.to_string()))?;
    let prediction = classify(&state, png).await?;
    let label = format!("generated {} sample", kind.as_str());
    Ok(Html(page(&result_html(&prediction, &label))))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    classifier: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        classifier: state.classifier.name(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Upload {
    label: String,
    bytes: Vec<u8>,
}

/// Pull the `image` field out of a multipart form.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, WebError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let label = field.file_name().unwrap_or("uploaded image").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| WebError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(WebError::BadRequest("uploaded image is empty".into()));
        }
        return Ok(Upload {
            label,
            bytes: bytes.to_vec(),
        });
    }
    Err(WebError::BadRequest("missing 'image' field".into()))
}

/// Decoding and inference are CPU-bound; keep them off the async workers.
async fn classify(state: &AppState, bytes: Vec<u8>) -> Result<Prediction, WebError> {
    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classify_bytes(classifier.as_ref(), &bytes))
        .await
        .map_err(|e| WebError::Internal(e.to_string()))?
        .map_err(|e| {
            warn!(error = %e, "classification failed");
            WebError::BadRequest(e.to_string())
        })?;
    info!(class = %prediction.class, confidence = prediction.confidence, "web analysis");
    Ok(prediction)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

const STYLE: &str = "body{font-family:sans-serif;max-width:760px;margin:2rem auto;padding:0 1rem;color:#222}\
.bar{background:#eee;border-radius:4px;height:18px;margin:2px 0 10px}\
.fill{background:#4a7bd0;height:100%;border-radius:4px}\
.fill.top{background:#d0644a}\
.ok{color:#2e7d32}.warn{color:#c62828}.error{color:#c62828}\
.disclaimer{border:1px solid #f0c36d;background:#fff8e1;padding:.75rem;margin-top:2rem}";

const UPLOAD_FORM: &str = r#"<h2>Upload MRI Image</h2>
<form action="/analyze" method="post" enctype="multipart/form-data">
  <input type="file" name="image" accept=".png,.jpg,.jpeg,.bmp,.tif,.tiff" required>
  <button type="submit">Analyze MRI Scan</button>
  <button type="submit" formaction="/analyze/export">Export Results</button>
</form>
<h3>Try Sample Images</h3>
<p><a href="/sample/normal">Generate Sample Brain MRI</a> | <a href="/sample/tumor">Generate Tumor Sample</a></p>"#;

fn page(body: &str) -> String {
    let disclaimer: String = DISCLAIMER.iter().map(|line| format!("<li>{line}</li>")).collect();
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>AI Brain Tumor MRI Scanner</title>\
         <style>{STYLE}</style></head><body><h1>AI Brain Tumor MRI Scanner</h1>{body}\
         <div class=\"disclaimer\"><strong>Medical Disclaimer</strong><ul>{disclaimer}</ul></div>\
         </body></html>"
    )
}

fn result_html(prediction: &Prediction, label: &str) -> String {
    let mut html = format!("<h2>Analysis Results</h2><p>Image: {}</p>", escape(label));

    if prediction.class.is_tumor() {
        html.push_str(&format!(
            "<p class=\"warn\"><strong>{} Detected</strong></p>",
            prediction.class
        ));
    } else {
        html.push_str("<p class=\"ok\"><strong>No Tumor Detected</strong></p>");
    }
    html.push_str(&format!("<p>Confidence: {:.2}%</p>", prediction.confidence));

    html.push_str("<h3>Classification Scores</h3>");
    for (class, prob) in prediction.scores() {
        let top = if class == prediction.class { " top" } else { "" };
        html.push_str(&format!(
            "<div>{class}: {prob:.2}%</div><div class=\"bar\"><div class=\"fill{top}\" style=\"width:{prob:.1}%\"></div></div>"
        ));
    }

    if prediction.class.is_tumor() {
        let info = tumor_info(prediction.class);
        html.push_str(&format!(
            "<h3>Tumor Information</h3><p><strong>Description:</strong> {}</p>\
             <p><strong>Severity Level:</strong> {}</p><p><strong>Treatment Options:</strong> {}</p>\
             <p><strong>Prognosis:</strong> {}</p>",
            info.description, info.severity, info.treatment, info.prognosis
        ));
    }
    html.push_str("<p><a href=\"/\">Analyze another scan</a></p>");
    html
}

use std::sync::Arc;

use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::queue;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Shared secret for the manual trigger, ad-hoc generation and
    /// moderation routes. Empty means those routes always refuse.
    pub run_secret: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/run/scheduled", post(run_scheduled))
        .route("/run/manual", post(run_manual))
        .route("/generate/url", post(generate_url))
        .route("/queue/pending", get(queue_pending))
        .route("/queue/{id}/approve", post(approve_draft))
        .route("/queue/{id}/reject", post(reject_draft))
        .route("/published/{id}/unpublish", post(unpublish_article))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    headers
        .get("x-run-secret")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == secret)
        .unwrap_or(false)
}

fn error_body(e: &PipelineError) -> Json<serde_json::Value> {
    Json(json!({ "error": e.to_string() }))
}

/// HTTP mapping for the ad-hoc and moderation paths. The run endpoints
/// always answer 500 on failure since the caller is a scheduler, not a user.
fn status_for(e: &PipelineError) -> StatusCode {
    match e {
        PipelineError::Fetch { .. } => StatusCode::BAD_REQUEST,
        PipelineError::Domain(_) => StatusCode::CONFLICT,
        PipelineError::Config(_)
        | PipelineError::Generation(_)
        | PipelineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Invoked by the platform cron with no input. Non-200 only on configuration
/// or top-level failure; per-source failures are inside the summary.
async fn run_scheduled(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.pipeline.run_once().await {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::to_value(summary).unwrap_or_default()),
        ),
        Err(e) => {
            tracing::error!(error = %e, "scheduled run failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(&e))
        }
    }
}

/// Same run, but caller-triggered and secret-gated.
async fn run_manual(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&headers, &state.run_secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing run secret" })),
        );
    }
    run_scheduled(State(state)).await
}

#[derive(serde::Deserialize)]
struct GenerateUrlReq {
    #[serde(default)]
    url: String,
    #[serde(default)]
    tag: Option<String>,
}

async fn generate_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateUrlReq>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&headers, &state.run_secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing run secret" })),
        );
    }
    if req.url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing url" })),
        );
    }
    match state
        .pipeline
        .generate_from_url(req.url.trim(), req.tag.as_deref())
        .await
    {
        Ok(draft) => (
            StatusCode::OK,
            Json(json!({
                "id": draft.id,
                "title": draft.content.title,
                "status": draft.status,
            })),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

#[derive(serde::Serialize)]
struct PendingOut {
    id: i64,
    title: String,
    slug: String,
    tag: String,
    generated_at: chrono::DateTime<chrono::Utc>,
}

async fn queue_pending(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.pipeline.store().pending_drafts(20).await {
        Ok(rows) => {
            let out: Vec<PendingOut> = rows
                .into_iter()
                .map(|d| PendingOut {
                    id: d.id,
                    title: d.content.title,
                    slug: d.content.slug,
                    tag: d.content.tag,
                    generated_at: d.generated_at,
                })
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::to_value(out).unwrap_or_default()),
            )
        }
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

async fn approve_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&headers, &state.run_secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing run secret" })),
        );
    }
    match queue::promote(&**state.pipeline.store(), id).await {
        Ok(published_id) => (StatusCode::OK, Json(json!({ "published_id": published_id }))),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

#[derive(serde::Deserialize, Default)]
struct RejectReq {
    #[serde(default)]
    note: Option<String>,
}

async fn reject_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Option<Json<RejectReq>>,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&headers, &state.run_secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing run secret" })),
        );
    }
    let note = body.and_then(|Json(r)| r.note);
    match queue::reject(&**state.pipeline.store(), id, note).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "rejected": id }))),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

async fn unpublish_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    if !authorized(&headers, &state.run_secret) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing run secret" })),
        );
    }
    match queue::unpublish(&**state.pipeline.store(), id).await {
        Ok(draft) => (
            StatusCode::OK,
            Json(json!({ "draft_id": draft.id, "status": draft.status })),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

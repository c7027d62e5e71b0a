use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use laddrr_core::feedback::{self, FeedbackSubmission};

use crate::error::AppError;
use crate::state::AppState;

/// Reviewer name used when a request does not carry one.
const DEFAULT_ACTOR: &str = "Reviewer";

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError(anyhow::anyhow!("task join error: {e}"))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/feedback: every submission, newest first (reviewer view).
pub async fn list_feedback(
    State(app): State<AppState>,
) -> Result<Json<Vec<FeedbackSubmission>>, AppError> {
    let store = app.store.clone();
    let list = tokio::task::spawn_blocking(move || feedback::list_all(&store))
        .await
        .map_err(join_error)??;
    Ok(Json(list))
}

/// GET /api/feedback/{id}
pub async fn get_feedback(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedbackSubmission>, AppError> {
    let store = app.store.clone();
    let found = tokio::task::spawn_blocking(move || feedback::require(&store, &id))
        .await
        .map_err(join_error)??;
    Ok(Json(found))
}

// ---------------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------------

/// POST /api/feedback/{id}/summarize: attach the model's summary once.
///
/// Store reads and writes run on the blocking pool; the model call is
/// awaited in between.
pub async fn summarize_feedback(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedbackSubmission>, AppError> {
    let store = app.store.clone();
    let lookup = id.clone();
    let current = tokio::task::spawn_blocking(move || feedback::require(&store, &lookup))
        .await
        .map_err(join_error)??;
    if current.summary.is_some() {
        return Ok(Json(current));
    }

    let analysis = feedback::analyze(&app.pipeline, &current).await?;

    let store = app.store.clone();
    let updated = tokio::task::spawn_blocking(move || feedback::attach_summary(&store, &id, analysis))
        .await
        .map_err(join_error)??;
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// Reviewer actions
// ---------------------------------------------------------------------------

/// POST /api/feedback/{id}/viewed
pub async fn mark_viewed(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedbackSubmission>, AppError> {
    let store = app.store.clone();
    let updated = tokio::task::spawn_blocking(move || feedback::mark_viewed(&store, &id))
        .await
        .map_err(join_error)??;
    Ok(Json(updated))
}

#[derive(serde::Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub actor: Option<String>,
    pub comment: String,
}

/// POST /api/feedback/{id}/updates: append a reviewer comment.
pub async fn add_update(
    State(app): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<FeedbackSubmission>, AppError> {
    let Json(body) = payload?;
    let store = app.store.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let actor = body.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
        feedback::add_update(&store, &id, actor, &body.comment)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(updated))
}

#[derive(serde::Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    pub actor: Option<String>,
    pub resolution: String,
}

/// POST /api/feedback/{id}/resolve
pub async fn resolve(
    State(app): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ResolveBody>, JsonRejection>,
) -> Result<Json<FeedbackSubmission>, AppError> {
    let Json(body) = payload?;
    let store = app.store.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let actor = body.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
        feedback::resolve(&store, &id, actor, &body.resolution)
    })
    .await
    .map_err(join_error)??;
    Ok(Json(updated))
}

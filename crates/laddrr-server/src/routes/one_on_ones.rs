use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use laddrr_core::flows::briefing::{generate_briefing_packet, BriefingPacketOutput};
use laddrr_core::flows::one_on_one::analyze_one_on_one;
use laddrr_core::history::{self, BriefingRequest, OneOnOneHistoryItem, RecordSessionInput};

use crate::error::AppError;
use crate::state::AppState;

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError(anyhow::anyhow!("task join error: {e}"))
}

/// GET /api/one-on-ones: every recorded session, newest first.
pub async fn list_sessions(
    State(app): State<AppState>,
) -> Result<Json<Vec<OneOnOneHistoryItem>>, AppError> {
    let store = app.store.clone();
    let list = tokio::task::spawn_blocking(move || history::list_all(&store))
        .await
        .map_err(join_error)??;
    Ok(Json(list))
}

/// POST /api/one-on-ones: analyze a session and store it.
pub async fn record_session(
    State(app): State<AppState>,
    payload: Result<Json<RecordSessionInput>, JsonRejection>,
) -> Result<Json<OneOnOneHistoryItem>, AppError> {
    let Json(input) = payload?;
    history::validate_session(&input)?;
    let analysis = analyze_one_on_one(&app.pipeline, &input.session).await?;

    let store = app.store.clone();
    let saved = tokio::task::spawn_blocking(move || history::save(&store, history::new_item(&input, analysis)))
        .await
        .map_err(join_error)??;
    Ok(Json(saved))
}

/// POST /api/one-on-ones/briefing: briefing packet from the pair's history.
pub async fn briefing(
    State(app): State<AppState>,
    payload: Result<Json<BriefingRequest>, JsonRejection>,
) -> Result<Json<BriefingPacketOutput>, AppError> {
    let Json(request) = payload?;
    let store = app.store.clone();
    let input = tokio::task::spawn_blocking(move || history::briefing_input(&store, &request))
        .await
        .map_err(join_error)??;
    let packet = generate_briefing_packet(&app.pipeline, &input).await?;
    Ok(Json(packet))
}

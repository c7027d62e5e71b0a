use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use laddrr_core::flows;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/ai: every flow with its input and output JSON Schemas.
pub async fn list_flows() -> Json<Vec<flows::FlowInfo>> {
    Json(flows::describe())
}

/// POST /api/ai/{flow}: run a flow on the request body.
///
/// Store-backed flows run on the blocking pool; the rest go through the
/// completion pipeline.
pub async fn run_flow(
    State(app): State<AppState>,
    Path(flow): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    if !flows::exists(&flow) {
        return Err(AppError(laddrr_core::LaddrrError::UnknownFlow(flow).into()));
    }
    let Json(input) = payload?;

    if flows::is_store_flow(&flow) {
        let store = app.store.clone();
        let output = tokio::task::spawn_blocking(move || flows::run_store_flow(&store, &flow, &input))
            .await
            .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
        return Ok(Json(output));
    }

    let output = flows::run_by_name(&app.pipeline, &flow, &input).await?;
    Ok(Json(output))
}

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use laddrr_core::flows::survey::SurveyQuestion;
use laddrr_core::surveys::{self, DeployedSurvey};
use laddrr_core::LaddrrError;

use crate::error::AppError;
use crate::state::AppState;

/// Run a blocking survey operation on the store.
async fn blocking<T, F>(app: &AppState, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&laddrr_core::Store) -> Result<T, LaddrrError> + Send + 'static,
{
    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(result)
}

// ---------------------------------------------------------------------------
// List / active
// ---------------------------------------------------------------------------

/// GET /api/surveys: every deployed survey, newest first.
pub async fn list_surveys(State(app): State<AppState>) -> Result<Json<Vec<DeployedSurvey>>, AppError> {
    Ok(Json(blocking(&app, surveys::list_all).await?))
}

/// GET /api/surveys/active: the latest active survey, or `null`.
pub async fn active_survey(
    State(app): State<AppState>,
) -> Result<Json<Option<DeployedSurvey>>, AppError> {
    Ok(Json(blocking(&app, surveys::latest_active).await?))
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
pub struct DeployBody {
    pub objective: String,
    pub questions: Vec<SurveyQuestion>,
}

/// POST /api/surveys: deploy a survey built from generated questions.
pub async fn deploy_survey(
    State(app): State<AppState>,
    payload: Result<Json<DeployBody>, JsonRejection>,
) -> Result<Json<DeployedSurvey>, AppError> {
    let Json(body) = payload?;
    let survey = blocking(&app, move |store| {
        surveys::deploy(store, &body.objective, body.questions)
    })
    .await?;
    Ok(Json(survey))
}

// ---------------------------------------------------------------------------
// Per-survey actions
// ---------------------------------------------------------------------------

/// POST /api/surveys/{id}/responses: count one anonymous response.
pub async fn submit_response(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeployedSurvey>, AppError> {
    Ok(Json(blocking(&app, move |store| surveys::submit_response(store, &id)).await?))
}

/// POST /api/surveys/{id}/opt-out
pub async fn opt_out(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeployedSurvey>, AppError> {
    Ok(Json(blocking(&app, move |store| surveys::log_opt_out(store, &id)).await?))
}

/// POST /api/surveys/{id}/close
pub async fn close_survey(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeployedSurvey>, AppError> {
    Ok(Json(blocking(&app, move |store| surveys::close(store, &id)).await?))
}

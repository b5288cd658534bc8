// src/handlers/proctoring.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::proctoring::ReportIncidentRequest, state::AppState,
};

/// Activates the proctoring session for an attempt (idempotent).
pub async fn start_camera(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.proctoring.start_camera(attempt_id).await?;
    Ok(Json(session))
}

/// Records one focus-loss violation. The third strike cancels the attempt.
pub async fn report_violation(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.proctoring.report_focus_violation(attempt_id).await?;
    Ok(Json(outcome))
}

/// Records a client-detected integrity incident (e.g. a second device in
/// frame), independent of the strike counter.
pub async fn report_incident(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<ReportIncidentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::BadRequest("incident_type_required".to_string()));
    }

    let incident = state.proctoring.report_incident(attempt_id, payload).await?;
    Ok((StatusCode::CREATED, Json(incident)))
}

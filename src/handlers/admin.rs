// src/handlers/admin.rs

use axum::{Json, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::exam::ExamType,
    models::policy::SetOverrideRequest,
    state::AppState,
};

/// Installs a one-shot retake override for `(user, exam_type)`.
/// Admin only. The next eligibility check succeeds and consumes the flag.
pub async fn set_policy_override(
    State(state): State<AppState>,
    Json(payload): Json<SetOverrideRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let exam_type = ExamType::parse(&payload.exam_type)?;

    state
        .tracker
        .set_override(payload.user_id, exam_type.as_str())
        .await?;

    Ok(Json(serde_json::json!({
        "user_id": payload.user_id,
        "exam_type": exam_type.as_str(),
        "override": true
    })))
}

/// Lists recorded integrity incidents, newest first.
/// Admin only.
pub async fn list_incidents(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let incidents = state.proctoring.list_incidents().await?;
    Ok(Json(incidents))
}

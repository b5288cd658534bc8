// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, state::AppState};

/// Returns one attempt row.
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = state.orchestrator.get_attempt(id).await?;
    Ok(Json(attempt))
}

/// Lists every attempt belonging to a user, newest first.
pub async fn list_user_attempts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = state.orchestrator.attempts_for_user(user_id).await?;
    Ok(Json(attempts))
}

/// Returns the per-skill rows written on submit.
pub async fn get_attempt_skills(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let skills = state.orchestrator.skills_for_attempt(id).await?;
    Ok(Json(skills))
}

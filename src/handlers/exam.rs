// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::{StartAttemptRequest, SubmitAttemptRequest},
    models::exam::CreateExamRequest,
    state::AppState,
};

/// Creates an exam and its first attempt.
///
/// Returns 201 Created with the exam id, attempt id and the frozen policy
/// snapshot.
pub async fn create_exam(
    State(state): State<AppState>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::BadRequest(
            "user_id_and_exam_type_required".to_string(),
        ));
    }

    let response = state
        .orchestrator
        .create(payload.user_id, &payload.exam_type, payload.course_id)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Starts an attempt and returns the learner-facing question package.
/// Hints and answer keys never appear in the response.
pub async fn start_attempt(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.attempt_id <= 0 {
        return Err(AppError::BadRequest("attempt_id_required".to_string()));
    }

    let view = state.orchestrator.start(exam_id, payload.attempt_id).await?;

    Ok(Json(view))
}

/// Submits answers for grading and returns the grading summary.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.attempt_id <= 0 || payload.answers.is_empty() {
        return Err(AppError::BadRequest(
            "attempt_id_and_answers_required".to_string(),
        ));
    }

    let summary = state
        .orchestrator
        .submit(exam_id, payload.attempt_id, &payload.answers)
        .await?;

    Ok(Json(summary))
}

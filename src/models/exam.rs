// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Represents the 'exams' table in the database.
///
/// An exam is created once and never mutated; all lifecycle state lives on
/// its attempts.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub user_id: i64,

    /// Exam type: 'baseline' or 'postcourse'.
    /// Mapped from the database column 'exam_type'.
    pub exam_type: String,

    /// Owning course, present only for postcourse exams.
    pub course_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// The two recognized exam types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamType {
    Baseline,
    Postcourse,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Baseline => "baseline",
            ExamType::Postcourse => "postcourse",
        }
    }

    /// Parses a client-supplied exam type, rejecting anything unrecognized.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "baseline" => Ok(ExamType::Baseline),
            "postcourse" => Ok(ExamType::Postcourse),
            _ => Err(AppError::BadRequest("invalid_exam_type".to_string())),
        }
    }
}

/// DTO for creating a new exam (and its first attempt).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(length(min = 1, max = 20))]
    pub exam_type: String,
    pub course_id: Option<i64>,
}

/// Response for a successful exam creation.
#[derive(Debug, Serialize)]
pub struct CreateExamResponse {
    pub exam_id: i64,
    pub attempt_id: i64,
    pub policy: crate::models::attempt::PolicySnapshot,
}

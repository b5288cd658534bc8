// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'attempts' table in the database.
///
/// The policy columns (`passing_grade`, `max_attempts`, `cooldown_hours`) are
/// a snapshot frozen at creation time. Eligibility decisions for this attempt
/// replay the snapshot, never live policy.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub exam_id: i64,

    /// Monotonic per exam, starting at 1.
    pub attempt_number: i32,

    pub passing_grade: f64,
    pub max_attempts: i32,
    pub cooldown_hours: i32,

    /// Opaque reference into the question package store.
    /// Null only in the window between attempt insert and package backfill.
    pub package_ref: Option<uuid::Uuid>,

    /// 'created', 'in_progress', 'completed' or 'canceled'.
    pub status: String,

    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    pub expires_at: chrono::DateTime<chrono::Utc>,

    pub final_grade: Option<f64>,
    pub passed: Option<bool>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Attempt lifecycle states. Stored as TEXT in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Created,
    InProgress,
    Completed,
    Canceled,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Created => "created",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Canceled => "canceled",
        }
    }
}

/// The retake policy frozen onto an attempt at creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub passing_grade: f64,
    pub max_attempts: i32,
    pub cooldown_hours: i32,
}

impl Attempt {
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            passing_grade: self.passing_grade,
            max_attempts: self.max_attempts,
            cooldown_hours: self.cooldown_hours,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.status == AttemptStatus::Canceled.as_str()
    }
}

/// Represents the 'attempt_skills' table: one row per (attempt, skill).
/// Upserted on submit; never deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptSkill {
    pub id: i64,
    pub attempt_id: i64,
    pub skill_id: String,
    pub skill_name: String,
    pub score: f64,

    /// 'acquired', 'failed' or 'pending'.
    pub status: String,
}

/// DTO for starting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(range(min = 1, message = "attempt_id_required"))]
    pub attempt_id: i64,
}

/// One graded answer in a submission. The score is produced by the
/// upstream grader; skills the learner never answered are absent here
/// and score 0 during aggregation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerSubmission {
    pub skill_id: String,
    pub skill_name: Option<String>,
    pub score: f64,
    pub response: Option<serde_json::Value>,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    pub attempt_id: i64,
    pub answers: Vec<AnswerSubmission>,
}

/// Per-skill grading outcome returned to the caller and pushed downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillResult {
    pub skill_id: String,
    pub skill_name: String,
    pub score: f64,
    pub passed: bool,
}

/// The grading summary produced on submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeSummary {
    pub final_grade: f64,
    pub passed: bool,
    pub per_skill: Vec<SkillResult>,
}

// src/models/proctoring.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'proctoring_sessions' table, unique on attempt_id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProctoringSession {
    pub id: i64,
    pub attempt_id: i64,
    pub exam_id: i64,

    /// 'inactive' or 'active'.
    pub camera_status: String,

    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub events: sqlx::types::Json<Vec<Value>>,
}

/// Represents the 'proctoring_violations' table, one row per attempt.
/// Created lazily on the first violation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProctoringViolation {
    pub id: i64,
    pub attempt_id: i64,

    /// Monotonically incrementing strike counter.
    pub strikes: i32,

    /// Append-only event log: 'focus_lost', 'exam_canceled', ...
    pub events: sqlx::types::Json<Vec<Value>>,
}

/// Represents the 'incidents' table: append-only out-of-band integrity
/// events (e.g. a second device in frame, detected client-side).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub attempt_id: Option<i64>,
    pub source: String,
    pub incident_type: String,

    /// 'low', 'medium', 'high' or 'critical'.
    pub severity: String,

    /// 'open', 'acknowledged' or 'closed'.
    pub status: String,

    pub details: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for reporting an incident.
#[derive(Debug, Deserialize, Validate)]
pub struct ReportIncidentRequest {
    #[validate(length(min = 1, max = 100, message = "incident_type_required"))]
    pub incident_type: String,
    #[validate(length(min = 1, max = 20))]
    pub severity: Option<String>,
    #[validate(length(max = 4000))]
    pub details: Option<String>,
}

/// Outcome of a focus violation report.
#[derive(Debug, Serialize)]
pub struct ViolationResponse {
    pub strikes: i32,
    pub canceled: bool,
}

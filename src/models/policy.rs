// src/models/policy.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The whole file-backed policy ledger document.
///
/// Read-modify-written as a unit on every call; concurrent writers are
/// last-writer-wins (acceptable under low per-user write concurrency).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyLedger {
    #[serde(default)]
    pub entries: HashMap<String, PolicyLedgerEntry>,
}

/// Per (user, exam_type) retake state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyLedgerEntry {
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,

    /// Administrative escape hatch; consumed by the next eligibility check.
    #[serde(rename = "override", default)]
    pub override_active: bool,

    /// Append-only, strictly increasing version numbers.
    #[serde(default)]
    pub history: Vec<AttemptHistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptHistoryEntry {
    pub version: u32,
    pub at: DateTime<Utc>,
}

/// Result of a retake eligibility check.
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Ok,
    CooldownActive { until: DateTime<Utc> },
    LimitReached,
}

/// DTO for the administrative override endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct SetOverrideRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(length(min = 1, max = 20))]
    pub exam_type: String,
}

pub fn ledger_key(user_id: i64, exam_type: &str) -> String {
    format!("{}:{}", user_id, exam_type)
}

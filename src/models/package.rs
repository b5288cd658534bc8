// src/models/package.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Represents the 'question_packages' table: one JSONB document per attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PackageRow {
    pub id: uuid::Uuid,
    pub attempt_id: i64,

    /// 'draft', 'in_progress', 'completed', 'cancelled' or 'archived'.
    pub status: String,

    pub doc: sqlx::types::Json<QuestionPackage>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Package document states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStatus {
    Draft,
    InProgress,
    Completed,
    Cancelled,
    Archived,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Draft => "draft",
            PackageStatus::InProgress => "in_progress",
            PackageStatus::Completed => "completed",
            PackageStatus::Cancelled => "cancelled",
            PackageStatus::Archived => "archived",
        }
    }
}

/// The question package document body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPackage {
    pub questions: Vec<PackageQuestion>,

    /// Lesson-to-skill mapping used to scope a postcourse exam.
    /// Empty for baseline exams.
    #[serde(default)]
    pub coverage_map: Vec<Value>,

    /// Filled in on submit.
    pub grading_summary: Option<crate::models::attempt::GradeSummary>,
}

/// One question inside a package. `answer_key`, `analysis` and `hints`
/// must never reach a learner-facing read (see [`PublicQuestion`] and
/// [`strip_hints`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageQuestion {
    pub id: uuid::Uuid,
    pub skill_id: String,
    pub skill_name: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer_key: String,
    pub analysis: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<String>>,

    /// Free-form generator metadata. May itself embed hints at any depth.
    #[serde(default)]
    pub metadata: Value,
}

/// DTO for sending a question to the learner (excludes answer key, analysis
/// and hints).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: uuid::Uuid,
    pub skill_id: String,
    pub skill_name: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub metadata: Value,
}

/// Learner-facing view of a package, produced on start.
#[derive(Debug, Serialize)]
pub struct PublicPackageView {
    pub package_ref: uuid::Uuid,
    pub status: String,
    pub questions: Vec<PublicQuestion>,
}

/// Recursively removes every `hints` key from a JSON value, at any depth.
///
/// Applied at every external read path so stored hint material can never
/// leak through nested metadata.
pub fn strip_hints(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("hints");
            for (_, v) in map.iter_mut() {
                strip_hints(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_hints(v);
            }
        }
        _ => {}
    }
}

impl QuestionPackage {
    /// Builds the learner-facing view: answer keys and analysis dropped by
    /// the DTO, hints stripped recursively out of metadata.
    pub fn public_view(&self, package_ref: uuid::Uuid, status: &str) -> PublicPackageView {
        let questions = self
            .questions
            .iter()
            .map(|q| {
                let mut metadata = q.metadata.clone();
                strip_hints(&mut metadata);
                PublicQuestion {
                    id: q.id,
                    skill_id: q.skill_id.clone(),
                    skill_name: q.skill_name.clone(),
                    prompt: q.prompt.clone(),
                    options: q.options.clone(),
                    metadata,
                }
            })
            .collect();

        PublicPackageView {
            package_ref,
            status: status.to_string(),
            questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_hints_removes_top_level_key() {
        let mut v = json!({"prompt": "q", "hints": ["look closer"]});
        strip_hints(&mut v);
        assert_eq!(v, json!({"prompt": "q"}));
    }

    #[test]
    fn strip_hints_removes_nested_keys() {
        let mut v = json!({
            "questions": [
                {"prompt": "q1", "meta": {"hints": ["a"], "difficulty": 2}},
                {"prompt": "q2", "extra": [{"deep": {"hints": ["b"]}}]}
            ]
        });
        strip_hints(&mut v);
        assert_eq!(
            v,
            json!({
                "questions": [
                    {"prompt": "q1", "meta": {"difficulty": 2}},
                    {"prompt": "q2", "extra": [{"deep": {}}]}
                ]
            })
        );
    }

    #[test]
    fn public_view_has_no_answer_material() {
        let pkg = QuestionPackage {
            questions: vec![PackageQuestion {
                id: uuid::Uuid::new_v4(),
                skill_id: "s1".to_string(),
                skill_name: "Skill One".to_string(),
                prompt: "What is X?".to_string(),
                options: vec!["A".to_string(), "B".to_string()],
                answer_key: "A".to_string(),
                analysis: Some("because".to_string()),
                hints: Some(vec!["think".to_string()]),
                metadata: json!({"generator": {"hints": ["leak"]}}),
            }],
            coverage_map: vec![],
            grading_summary: None,
        };

        let view = pkg.public_view(uuid::Uuid::new_v4(), "in_progress");
        let rendered = serde_json::to_value(&view).unwrap();
        let text = rendered.to_string();
        assert!(!text.contains("hints"));
        assert!(!text.contains("answer_key"));
        assert!(!text.contains("analysis"));
    }
}

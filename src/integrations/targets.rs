// src/integrations/targets.rs

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::integrations::gateway::GatewayClient;
use crate::models::attempt::GradeSummary;

/// One gateway per external learning-platform system, all sharing a single
/// transport. Every call degrades to that system's documented mock shape on
/// failure, so none of these methods can fail.
pub struct Gateways {
    pub directory: DirectoryGateway,
    pub skills: SkillsGateway,
    pub courses: CourseGateway,
    pub dev_lab: DevLabGateway,
    pub camera: CameraGateway,
    pub incidents: IncidentGateway,
}

impl Gateways {
    pub fn new(client: GatewayClient) -> Self {
        Gateways {
            directory: DirectoryGateway {
                client: client.clone(),
            },
            skills: SkillsGateway {
                client: client.clone(),
            },
            courses: CourseGateway {
                client: client.clone(),
            },
            dev_lab: DevLabGateway {
                client: client.clone(),
            },
            camera: CameraGateway {
                client: client.clone(),
            },
            incidents: IncidentGateway { client },
        }
    }
}

/// Contract of the policy source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub passing_grade: f64,
    pub max_attempts: Option<i32>,
    pub retry_cooldown_hours: Option<i32>,
    pub exam_duration_minutes: Option<i64>,
}

impl PolicyResponse {
    pub fn mock() -> Self {
        PolicyResponse {
            passing_grade: 70.0,
            max_attempts: Some(3),
            retry_cooldown_hours: Some(24),
            exam_duration_minutes: Some(120),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRef {
    pub skill_id: String,
    pub skill_name: String,
}

/// Contract of the skills source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsResponse {
    pub user_id: i64,
    pub skills: Vec<SkillRef>,
}

impl SkillsResponse {
    pub fn mock(user_id: i64) -> Self {
        SkillsResponse {
            user_id,
            skills: vec![
                SkillRef {
                    skill_id: "skill-foundations".to_string(),
                    skill_name: "Foundations".to_string(),
                },
                SkillRef {
                    skill_id: "skill-applied-practice".to_string(),
                    skill_name: "Applied Practice".to_string(),
                },
                SkillRef {
                    skill_id: "skill-problem-solving".to_string(),
                    skill_name: "Problem Solving".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageEntry {
    pub lesson_id: String,
    pub lesson_name: String,
    pub skills: Vec<SkillRef>,
}

/// Contract of the coverage source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageResponse {
    pub course_id: i64,
    pub course_name: String,
    pub coverage_map: Vec<CoverageEntry>,
}

impl CoverageResponse {
    pub fn mock(course_id: i64) -> Self {
        CoverageResponse {
            course_id,
            course_name: format!("Course {}", course_id),
            coverage_map: vec![
                CoverageEntry {
                    lesson_id: "lesson-1".to_string(),
                    lesson_name: "Getting Started".to_string(),
                    skills: vec![SkillRef {
                        skill_id: "skill-foundations".to_string(),
                        skill_name: "Foundations".to_string(),
                    }],
                },
                CoverageEntry {
                    lesson_id: "lesson-2".to_string(),
                    lesson_name: "Going Deeper".to_string(),
                    skills: vec![SkillRef {
                        skill_id: "skill-applied-practice".to_string(),
                        skill_name: "Applied Practice".to_string(),
                    }],
                },
            ],
        }
    }
}

/// A question as produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub skill_id: String,
    pub skill_name: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer_key: String,
    pub analysis: Option<String>,
    pub hints: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSetResponse {
    pub questions: Vec<GeneratedQuestion>,
}

impl QuestionSetResponse {
    /// Deterministic per skill list: one question per skill, answer key 'A'.
    pub fn mock(skills: &[SkillRef]) -> Self {
        QuestionSetResponse {
            questions: skills
                .iter()
                .map(|s| GeneratedQuestion {
                    skill_id: s.skill_id.clone(),
                    skill_name: s.skill_name.clone(),
                    prompt: format!("Which statement best describes {}?", s.skill_name),
                    options: vec![
                        "A. The accepted definition".to_string(),
                        "B. A common misconception".to_string(),
                        "C. An unrelated concept".to_string(),
                        "D. None of the above".to_string(),
                    ],
                    answer_key: "A".to_string(),
                    analysis: Some(format!(
                        "Option A matches the standard definition of {}.",
                        s.skill_name
                    )),
                    hints: Some(vec![format!(
                        "Recall the core definition of {}.",
                        s.skill_name
                    )]),
                    metadata: json!({"generator": "mock", "skill": s.skill_id}),
                })
                .collect(),
        }
    }
}

pub struct DirectoryGateway {
    client: GatewayClient,
}

impl DirectoryGateway {
    pub async fn fetch_exam_policy(&self, user_id: i64, exam_type: &str) -> PolicyResponse {
        let mock = PolicyResponse::mock();
        let value = self
            .client
            .dispatch(
                "directory",
                "fetch_exam_policy",
                json!({"user_id": user_id, "exam_type": exam_type}),
                "passing_grade",
                serde_json::to_value(&mock).unwrap_or_default(),
            )
            .await;
        serde_json::from_value(value).unwrap_or(mock)
    }

    pub async fn push_exam_result(&self, user_id: i64, exam_id: i64, summary: &GradeSummary) {
        self.client
            .dispatch(
                "directory",
                "record_exam_result",
                json!({
                    "user_id": user_id,
                    "exam_id": exam_id,
                    "final_grade": summary.final_grade,
                    "passed": summary.passed,
                }),
                "acknowledged",
                json!({"acknowledged": true}),
            )
            .await;
    }
}

pub struct SkillsGateway {
    client: GatewayClient,
}

impl SkillsGateway {
    pub async fn fetch_user_skills(&self, user_id: i64) -> SkillsResponse {
        let mock = SkillsResponse::mock(user_id);
        let value = self
            .client
            .dispatch(
                "skills-engine",
                "fetch_user_skills",
                json!({"user_id": user_id}),
                "skills",
                serde_json::to_value(&mock).unwrap_or_default(),
            )
            .await;
        serde_json::from_value(value).unwrap_or(mock)
    }

    pub async fn push_skill_results(&self, user_id: i64, summary: &GradeSummary) {
        self.client
            .dispatch(
                "skills-engine",
                "record_skill_results",
                json!({"user_id": user_id, "per_skill": &summary.per_skill}),
                "acknowledged",
                json!({"acknowledged": true}),
            )
            .await;
    }
}

pub struct CourseGateway {
    client: GatewayClient,
}

impl CourseGateway {
    pub async fn fetch_coverage_map(&self, course_id: i64) -> CoverageResponse {
        let mock = CoverageResponse::mock(course_id);
        let value = self
            .client
            .dispatch(
                "course-builder",
                "fetch_coverage_map",
                json!({"course_id": course_id}),
                "coverage_map",
                serde_json::to_value(&mock).unwrap_or_default(),
            )
            .await;
        serde_json::from_value(value).unwrap_or(mock)
    }

    pub async fn push_course_result(&self, course_id: i64, user_id: i64, summary: &GradeSummary) {
        self.client
            .dispatch(
                "course-builder",
                "record_course_result",
                json!({
                    "course_id": course_id,
                    "user_id": user_id,
                    "final_grade": summary.final_grade,
                    "passed": summary.passed,
                }),
                "acknowledged",
                json!({"acknowledged": true}),
            )
            .await;
    }
}

pub struct DevLabGateway {
    client: GatewayClient,
}

impl DevLabGateway {
    pub async fn generate_questions(&self, skills: &[SkillRef]) -> QuestionSetResponse {
        let mock = QuestionSetResponse::mock(skills);
        let value = self
            .client
            .dispatch(
                "dev-lab",
                "generate_questions",
                json!({"skills": skills}),
                "questions",
                serde_json::to_value(&mock).unwrap_or_default(),
            )
            .await;
        serde_json::from_value(value).unwrap_or(mock)
    }
}

pub struct CameraGateway {
    client: GatewayClient,
}

impl CameraGateway {
    pub async fn activate(&self, attempt_id: i64, exam_id: i64) -> Value {
        self.client
            .dispatch(
                "proctoring-camera",
                "activate_session",
                json!({"attempt_id": attempt_id, "exam_id": exam_id}),
                "activated",
                json!({"activated": true, "attempt_id": attempt_id}),
            )
            .await
    }

    pub async fn push_summary(&self, attempt_id: i64, summary: &GradeSummary) {
        self.client
            .dispatch(
                "proctoring-camera",
                "record_attempt_summary",
                json!({
                    "attempt_id": attempt_id,
                    "final_grade": summary.final_grade,
                    "passed": summary.passed,
                }),
                "acknowledged",
                json!({"acknowledged": true}),
            )
            .await;
    }
}

pub struct IncidentGateway {
    client: GatewayClient,
}

impl IncidentGateway {
    /// Best-effort administrative alert fired when an attempt is canceled.
    pub async fn raise_cancellation_alert(&self, user_id: i64, attempt_id: i64, exam_type: &str) {
        self.client
            .dispatch(
                "incident-response",
                "raise_alert",
                json!({
                    "user_id": user_id,
                    "attempt_id": attempt_id,
                    "exam_type": exam_type,
                    "reason": "strike_limit_exceeded",
                }),
                "alert_id",
                json!({"alert_id": format!("mock-alert-{}", attempt_id), "status": "queued"}),
            )
            .await;
    }
}

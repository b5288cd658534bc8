// src/services/orchestrator.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::DEFAULT_EXAM_DURATION_MINUTES;
use crate::error::AppError;
use crate::integrations::targets::{Gateways, SkillRef};
use crate::models::attempt::{
    AnswerSubmission, Attempt, GradeSummary, PolicySnapshot,
};
use crate::models::exam::{CreateExamResponse, Exam, ExamType};
use crate::models::package::{PackageQuestion, PublicPackageView, QuestionPackage};
use crate::models::policy::Eligibility;
use crate::services::grader::Grader;
use crate::services::ledger::AttemptLedger;
use crate::services::package_store::PackageStore;
use crate::services::policy_tracker::PolicyTracker;

/// Top-level coordinator for the exam lifecycle: create -> start -> submit.
///
/// Pulls policy/skills/coverage from the gateways, writes the relational
/// ledger and the document package store in separate round-trips, and fires
/// best-effort result pushes after submit.
pub struct ExamOrchestrator {
    ledger: AttemptLedger,
    packages: PackageStore,
    tracker: Arc<PolicyTracker>,
    gateways: Arc<Gateways>,
    grader: Box<dyn Grader>,
}

impl ExamOrchestrator {
    pub fn new(
        ledger: AttemptLedger,
        packages: PackageStore,
        tracker: Arc<PolicyTracker>,
        gateways: Arc<Gateways>,
        grader: Box<dyn Grader>,
    ) -> Self {
        ExamOrchestrator {
            ledger,
            packages,
            tracker,
            gateways,
            grader,
        }
    }

    /// Creates an exam and its first attempt with a frozen policy snapshot,
    /// builds the question package, and backfills the package reference.
    pub async fn create(
        &self,
        user_id: i64,
        exam_type_raw: &str,
        course_id: Option<i64>,
    ) -> Result<CreateExamResponse, AppError> {
        let exam_type = ExamType::parse(exam_type_raw)?;

        if exam_type == ExamType::Baseline && self.ledger.baseline_exists(user_id).await? {
            return Err(AppError::BadRequest("baseline_already_exists".to_string()));
        }

        let policy = self
            .gateways
            .directory
            .fetch_exam_policy(user_id, exam_type.as_str())
            .await;

        let snapshot = PolicySnapshot {
            passing_grade: policy.passing_grade,
            max_attempts: policy.max_attempts.unwrap_or(match exam_type {
                ExamType::Baseline => 1,
                ExamType::Postcourse => 3,
            }),
            cooldown_hours: policy.retry_cooldown_hours.unwrap_or(24),
        };

        // Retake gate for postcourse rebuilds; baseline is covered by the
        // one-baseline-per-user rule above.
        if exam_type == ExamType::Postcourse {
            match self
                .tracker
                .can_attempt(user_id, exam_type.as_str(), snapshot.max_attempts)
                .await?
            {
                Eligibility::Ok => {}
                Eligibility::CooldownActive { .. } => {
                    return Err(AppError::Forbidden("retake_cooldown_active".to_string()));
                }
                Eligibility::LimitReached => {
                    return Err(AppError::Forbidden("max_attempts_reached".to_string()));
                }
            }
        }

        let doc = self.build_package(user_id, exam_type, course_id).await?;

        let exam_id = self
            .ledger
            .insert_exam(user_id, exam_type.as_str(), course_id)
            .await?;

        let duration = policy
            .exam_duration_minutes
            .unwrap_or(DEFAULT_EXAM_DURATION_MINUTES);
        let expires_at = Utc::now() + Duration::minutes(duration);

        let attempt_id = self
            .ledger
            .insert_attempt(exam_id, 1, &snapshot, expires_at)
            .await?;

        // Separate round-trips: attempt row first, then the package
        // document, then the reference backfill. No shared transaction.
        let package_ref = self.packages.insert(attempt_id, &doc).await?;
        self.ledger.set_package_ref(attempt_id, package_ref).await?;

        tracing::info!(
            "Created {} exam {} (attempt {}) for user {}",
            exam_type.as_str(),
            exam_id,
            attempt_id,
            user_id
        );

        Ok(CreateExamResponse {
            exam_id,
            attempt_id,
            policy: snapshot,
        })
    }

    /// Sources skills (baseline) or a coverage map (postcourse) from the
    /// gateways and builds the question package document.
    async fn build_package(
        &self,
        user_id: i64,
        exam_type: ExamType,
        course_id: Option<i64>,
    ) -> Result<QuestionPackage, AppError> {
        let (skills, coverage_map) = match exam_type {
            ExamType::Baseline => {
                let skills = self.gateways.skills.fetch_user_skills(user_id).await;
                (skills.skills, Vec::new())
            }
            ExamType::Postcourse => {
                let course_id = course_id
                    .ok_or(AppError::BadRequest("course_id_required".to_string()))?;
                let coverage = self.gateways.courses.fetch_coverage_map(course_id).await;

                let mut skills: Vec<SkillRef> = Vec::new();
                for entry in &coverage.coverage_map {
                    for skill in &entry.skills {
                        if !skills.iter().any(|s| s.skill_id == skill.skill_id) {
                            skills.push(skill.clone());
                        }
                    }
                }

                let coverage_map = coverage
                    .coverage_map
                    .iter()
                    .filter_map(|e| serde_json::to_value(e).ok())
                    .collect();
                (skills, coverage_map)
            }
        };

        let generated = self.gateways.dev_lab.generate_questions(&skills).await;

        Ok(QuestionPackage {
            questions: generated
                .questions
                .into_iter()
                .map(|q| PackageQuestion {
                    id: Uuid::new_v4(),
                    skill_id: q.skill_id,
                    skill_name: q.skill_name,
                    prompt: q.prompt,
                    options: q.options,
                    answer_key: q.answer_key,
                    analysis: q.analysis,
                    hints: q.hints,
                    metadata: q.metadata,
                })
                .collect(),
            coverage_map,
            grading_summary: None,
        })
    }

    /// Repair phase for the dual-store write gap: finds attempts whose
    /// package reference was never backfilled and replays the package
    /// build for each. Returns how many were repaired.
    pub async fn reconcile_incomplete_attempts(&self) -> Result<usize, AppError> {
        let orphans = self.ledger.attempts_missing_package(50).await?;
        let mut repaired = 0;

        for attempt in orphans {
            let Some(exam) = self.ledger.find_exam(attempt.exam_id).await? else {
                continue;
            };
            let exam_type = ExamType::parse(&exam.exam_type)?;

            let doc = match self.build_package(exam.user_id, exam_type, exam.course_id).await {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!("Cannot rebuild package for attempt {}: {}", attempt.id, e);
                    continue;
                }
            };

            let package_ref = self.packages.insert(attempt.id, &doc).await?;
            self.ledger.set_package_ref(attempt.id, package_ref).await?;
            repaired += 1;
            tracing::info!(
                "Reconciled attempt {} with rebuilt package {}",
                attempt.id,
                package_ref
            );
        }

        Ok(repaired)
    }

    /// Starts an attempt: gate checks, idempotent `started_at`, and the
    /// learner-facing package view with hints stripped.
    pub async fn start(
        &self,
        exam_id: i64,
        attempt_id: i64,
    ) -> Result<PublicPackageView, AppError> {
        let attempt = self.require_attempt(attempt_id).await?;
        if attempt.exam_id != exam_id {
            return Err(AppError::BadRequest("exam_mismatch".to_string()));
        }
        self.check_open(&attempt)?;

        let exam = self
            .ledger
            .find_exam(attempt.exam_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "attempt {} references missing exam {}",
                    attempt.id, attempt.exam_id
                ))
            })?;

        let attempt_count = self.ledger.count_attempts(exam.id).await?;
        match ExamType::parse(&exam.exam_type)? {
            ExamType::Baseline => {
                if attempt.attempt_number > 1 || attempt_count > 1 {
                    return Err(AppError::Forbidden(
                        "baseline_attempt_not_allowed".to_string(),
                    ));
                }
            }
            ExamType::Postcourse => {
                if attempt.attempt_number > attempt.max_attempts
                    || attempt_count > attempt.max_attempts as i64
                {
                    return Err(AppError::Forbidden("max_attempts_reached".to_string()));
                }
            }
        }

        self.ledger.mark_started(attempt_id, Utc::now()).await?;

        let package_ref = attempt.package_ref.ok_or_else(|| {
            AppError::InternalServerError(format!(
                "attempt {} has no package reference",
                attempt.id
            ))
        })?;
        self.packages.mark_in_progress(package_ref).await?;

        let row = self.packages.fetch(package_ref).await?.ok_or_else(|| {
            AppError::InternalServerError(format!("package {} not found", package_ref))
        })?;

        Ok(row.doc.0.public_view(package_ref, &row.status))
    }

    /// Grades and finalizes an attempt, then fires the downstream result
    /// pushes without blocking the response.
    pub async fn submit(
        &self,
        exam_id: i64,
        attempt_id: i64,
        answers: &[AnswerSubmission],
    ) -> Result<GradeSummary, AppError> {
        let attempt = self.require_attempt(attempt_id).await?;
        if attempt.exam_id != exam_id {
            return Err(AppError::BadRequest("exam_mismatch".to_string()));
        }
        self.check_open(&attempt)?;

        let exam = self
            .ledger
            .find_exam(attempt.exam_id)
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "attempt {} references missing exam {}",
                    attempt.id, attempt.exam_id
                ))
            })?;

        let package_ref = attempt.package_ref.ok_or_else(|| {
            AppError::InternalServerError(format!(
                "attempt {} has no package reference",
                attempt.id
            ))
        })?;
        let row = self.packages.fetch(package_ref).await?.ok_or_else(|| {
            AppError::InternalServerError(format!("package {} not found", package_ref))
        })?;

        let summary = self
            .grader
            .grade(&row.doc.0.questions, answers, attempt.passing_grade);

        let recorded = self
            .ledger
            .record_submission(attempt_id, Utc::now(), summary.final_grade, summary.passed)
            .await?;
        if !recorded {
            return Err(AppError::Conflict("attempt_already_submitted".to_string()));
        }

        for skill in &summary.per_skill {
            let status = if skill.passed { "acquired" } else { "failed" };
            self.ledger
                .upsert_skill(attempt_id, &skill.skill_id, &skill.skill_name, skill.score, status)
                .await?;
        }

        let mut doc = row.doc.0;
        doc.grading_summary = Some(summary.clone());
        self.packages.complete(package_ref, &doc).await?;

        self.tracker
            .record_attempt(exam.user_id, &exam.exam_type)
            .await?;
        if !summary.passed {
            self.tracker
                .set_cooldown(exam.user_id, &exam.exam_type, attempt.cooldown_hours)
                .await?;
        }

        self.push_results(exam, attempt_id, summary.clone());

        Ok(summary)
    }

    /// Fire-and-forget downstream propagation: at-most-once, best-effort.
    /// Gateway fallbacks already absorb every failure, so nothing here can
    /// surface to the caller.
    fn push_results(&self, exam: Exam, attempt_id: i64, summary: GradeSummary) {
        let gateways = self.gateways.clone();
        tokio::spawn(async move {
            gateways
                .directory
                .push_exam_result(exam.user_id, exam.id, &summary)
                .await;
            gateways
                .skills
                .push_skill_results(exam.user_id, &summary)
                .await;
            if exam.exam_type == ExamType::Postcourse.as_str() {
                if let Some(course_id) = exam.course_id {
                    gateways
                        .courses
                        .push_course_result(course_id, exam.user_id, &summary)
                        .await;
                }
            }
            gateways.camera.push_summary(attempt_id, &summary).await;
        });
    }

    async fn require_attempt(&self, attempt_id: i64) -> Result<Attempt, AppError> {
        self.ledger
            .find_attempt(attempt_id)
            .await?
            .ok_or(AppError::NotFound("attempt_not_found".to_string()))
    }

    /// Cancellation is terminal and checked before everything else; an
    /// expired window is next.
    fn check_open(&self, attempt: &Attempt) -> Result<(), AppError> {
        if attempt.is_canceled() {
            return Err(AppError::Forbidden("attempt_canceled".to_string()));
        }
        if Utc::now() > attempt.expires_at {
            return Err(AppError::Forbidden("exam_time_expired".to_string()));
        }
        Ok(())
    }

    // Read projections.

    pub async fn get_attempt(&self, attempt_id: i64) -> Result<Attempt, AppError> {
        self.require_attempt(attempt_id).await
    }

    pub async fn attempts_for_user(&self, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        self.ledger.attempts_for_user(user_id).await
    }

    pub async fn skills_for_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<crate::models::attempt::AttemptSkill>, AppError> {
        self.require_attempt(attempt_id).await?;
        self.ledger.skills_for_attempt(attempt_id).await
    }
}

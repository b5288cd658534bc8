// src/services/ledger.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::attempt::{Attempt, AttemptSkill, PolicySnapshot};
use crate::models::exam::Exam;

/// Relational attempt ledger: authoritative row-per-exam and row-per-attempt
/// records.
///
/// State transitions use read-then-conditional-write guards (`WHERE` clauses
/// on the prior state) rather than row locks; see DESIGN.md for the
/// concurrency trade-off.
#[derive(Clone)]
pub struct AttemptLedger {
    pool: PgPool,
}

impl AttemptLedger {
    pub fn new(pool: PgPool) -> Self {
        AttemptLedger { pool }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One baseline exam ever exists per user; checked before insert.
    pub async fn baseline_exists(&self, user_id: i64) -> Result<bool, AppError> {
        let row: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM exams WHERE user_id = $1 AND exam_type = 'baseline' LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    pub async fn insert_exam(
        &self,
        user_id: i64,
        exam_type: &str,
        course_id: Option<i64>,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO exams (user_id, exam_type, course_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(user_id)
        .bind(exam_type)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::BadRequest("baseline_already_exists".to_string())
            } else {
                tracing::error!("Failed to insert exam: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

        Ok(id)
    }

    pub async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            "SELECT id, user_id, exam_type, course_id, created_at FROM exams WHERE id = $1",
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }

    pub async fn insert_attempt(
        &self,
        exam_id: i64,
        attempt_number: i32,
        snapshot: &PolicySnapshot,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO attempts
                (exam_id, attempt_number, passing_grade, max_attempts, cooldown_hours,
                 status, expires_at)
            VALUES ($1, $2, $3, $4, $5, 'created', $6)
            RETURNING id
            "#,
        )
        .bind(exam_id)
        .bind(attempt_number)
        .bind(snapshot.passing_grade)
        .bind(snapshot.max_attempts)
        .bind(snapshot.cooldown_hours)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Backfills the opaque package reference after the document store write.
    pub async fn set_package_ref(
        &self,
        attempt_id: i64,
        package_ref: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE attempts SET package_ref = $2 WHERE id = $1")
            .bind(attempt_id)
            .bind(package_ref)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn find_attempt(&self, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, exam_id, attempt_number, passing_grade, max_attempts,
                   cooldown_hours, package_ref, status, started_at, submitted_at,
                   expires_at, final_grade, passed, created_at
            FROM attempts
            WHERE id = $1
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    pub async fn count_attempts(&self, exam_id: i64) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE exam_id = $1")
                .bind(exam_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Sets `started_at` exactly once; repeat calls are a no-op.
    pub async fn mark_started(
        &self,
        attempt_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE attempts
            SET started_at = $2, status = 'in_progress'
            WHERE id = $1 AND started_at IS NULL AND status = 'created'
            "#,
        )
        .bind(attempt_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes the final grade exactly once. Returns false when the attempt
    /// was already submitted or canceled in the meantime.
    pub async fn record_submission(
        &self,
        attempt_id: i64,
        now: DateTime<Utc>,
        final_grade: f64,
        passed: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE attempts
            SET submitted_at = $2, final_grade = $3, passed = $4, status = 'completed'
            WHERE id = $1 AND submitted_at IS NULL AND status <> 'canceled'
            "#,
        )
        .bind(attempt_id)
        .bind(now)
        .bind(final_grade)
        .bind(passed)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Terminal cancellation, guarded so a second cancel is a no-op.
    /// Returns true only for the call that actually flipped the status.
    pub async fn cancel(&self, attempt_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE attempts SET status = 'canceled' WHERE id = $1 AND status <> 'canceled'",
        )
        .bind(attempt_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn upsert_skill(
        &self,
        attempt_id: i64,
        skill_id: &str,
        skill_name: &str,
        score: f64,
        status: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO attempt_skills (attempt_id, skill_id, skill_name, score, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (attempt_id, skill_id) DO UPDATE SET
                skill_name = EXCLUDED.skill_name,
                score = EXCLUDED.score,
                status = EXCLUDED.status
            "#,
        )
        .bind(attempt_id)
        .bind(skill_id)
        .bind(skill_name)
        .bind(score)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn skills_for_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<AttemptSkill>, AppError> {
        let skills = sqlx::query_as::<_, AttemptSkill>(
            r#"
            SELECT id, attempt_id, skill_id, skill_name, score, status
            FROM attempt_skills
            WHERE attempt_id = $1
            ORDER BY skill_id
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(skills)
    }

    /// Attempts whose package backfill never landed: the recoverable half
    /// of the dual-store write gap.
    pub async fn attempts_missing_package(&self, limit: i64) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, exam_id, attempt_number, passing_grade, max_attempts,
                   cooldown_hours, package_ref, status, started_at, submitted_at,
                   expires_at, final_grade, passed, created_at
            FROM attempts
            WHERE package_ref IS NULL AND status IN ('created', 'in_progress')
            ORDER BY id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }

    pub async fn attempts_for_user(&self, user_id: i64) -> Result<Vec<Attempt>, AppError> {
        let attempts = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT a.id, a.exam_id, a.attempt_number, a.passing_grade, a.max_attempts,
                   a.cooldown_hours, a.package_ref, a.status, a.started_at, a.submitted_at,
                   a.expires_at, a.final_grade, a.passed, a.created_at
            FROM attempts a
            JOIN exams e ON a.exam_id = e.id
            WHERE e.user_id = $1
            ORDER BY a.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }
}

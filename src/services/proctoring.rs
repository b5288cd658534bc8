// src/services/proctoring.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::config::STRIKE_LIMIT;
use crate::error::AppError;
use crate::integrations::targets::Gateways;
use crate::models::attempt::Attempt;
use crate::models::proctoring::{
    Incident, ProctoringSession, ProctoringViolation, ReportIncidentRequest, ViolationResponse,
};
use crate::services::ledger::AttemptLedger;
use crate::services::package_store::PackageStore;
use crate::utils::sanitize::clean_text;

/// Proctoring integrity engine: session activation, the strike state machine
/// and its cancellation side effects.
///
/// States per attempt: no_session -> active -> (violation)* -> canceled.
pub struct ProctoringEngine {
    ledger: AttemptLedger,
    packages: PackageStore,
    gateways: Arc<Gateways>,
}

impl ProctoringEngine {
    pub fn new(pool: PgPool, packages: PackageStore, gateways: Arc<Gateways>) -> Self {
        ProctoringEngine {
            ledger: AttemptLedger::new(pool),
            packages,
            gateways,
        }
    }

    async fn require_attempt(&self, attempt_id: i64) -> Result<Attempt, AppError> {
        self.ledger
            .find_attempt(attempt_id)
            .await?
            .ok_or(AppError::NotFound("attempt_not_found".to_string()))
    }

    /// Activates the proctoring session for an attempt. Idempotent: repeat
    /// calls leave the session active.
    pub async fn start_camera(&self, attempt_id: i64) -> Result<ProctoringSession, AppError> {
        let attempt = self.require_attempt(attempt_id).await?;

        let session = sqlx::query_as::<_, ProctoringSession>(
            r#"
            INSERT INTO proctoring_sessions (attempt_id, exam_id, camera_status, started_at, events)
            VALUES ($1, $2, 'active', $3, '[]'::jsonb)
            ON CONFLICT (attempt_id) DO UPDATE SET camera_status = 'active'
            RETURNING id, attempt_id, exam_id, camera_status, started_at, events
            "#,
        )
        .bind(attempt_id)
        .bind(attempt.exam_id)
        .bind(Utc::now())
        .fetch_one(self.ledger_pool())
        .await?;

        // Remote camera activation is best-effort; the local session is
        // already authoritative.
        let gateways = self.gateways.clone();
        let exam_id = attempt.exam_id;
        tokio::spawn(async move {
            gateways.camera.activate(attempt_id, exam_id).await;
        });

        Ok(session)
    }

    /// Records one focus-loss strike. At the strike limit the attempt is
    /// canceled (conditionally, so only one call wins) and an administrative
    /// alert goes out.
    pub async fn report_focus_violation(
        &self,
        attempt_id: i64,
    ) -> Result<ViolationResponse, AppError> {
        let attempt = self.require_attempt(attempt_id).await?;

        let event = json!({"type": "focus_lost", "at": Utc::now()});
        let violation = sqlx::query_as::<_, ProctoringViolation>(
            r#"
            INSERT INTO proctoring_violations (attempt_id, strikes, events)
            VALUES ($1, 1, '[]'::jsonb || $2)
            ON CONFLICT (attempt_id) DO UPDATE SET
                strikes = proctoring_violations.strikes + 1,
                events = proctoring_violations.events || $2
            RETURNING id, attempt_id, strikes, events
            "#,
        )
        .bind(attempt_id)
        .bind(Json(&event))
        .fetch_one(self.ledger_pool())
        .await?;

        let mut canceled = attempt.is_canceled();

        if violation.strikes >= STRIKE_LIMIT {
            canceled = true;
            if self.ledger.cancel(attempt_id).await? {
                self.on_canceled(&attempt).await?;
            }
        }

        Ok(ViolationResponse {
            strikes: violation.strikes,
            canceled,
        })
    }

    /// Side effects of a fresh cancellation: violation log, package status,
    /// admin alert. Runs only for the call that actually flipped the row.
    async fn on_canceled(&self, attempt: &Attempt) -> Result<(), AppError> {
        let event = json!({"type": "exam_canceled", "at": Utc::now()});
        sqlx::query(
            "UPDATE proctoring_violations SET events = events || $2 WHERE attempt_id = $1",
        )
        .bind(attempt.id)
        .bind(Json(&event))
        .execute(self.ledger_pool())
        .await?;

        if let Some(package_ref) = attempt.package_ref {
            self.packages.cancel(package_ref).await?;
        }

        let exam = self.ledger.find_exam(attempt.exam_id).await?;
        let (user_id, exam_type) = match exam {
            Some(e) => (e.user_id, e.exam_type),
            None => return Ok(()),
        };

        tracing::warn!(
            "Attempt {} canceled after {} strikes (user {})",
            attempt.id,
            STRIKE_LIMIT,
            user_id
        );

        let gateways = self.gateways.clone();
        let attempt_id = attempt.id;
        tokio::spawn(async move {
            gateways
                .incidents
                .raise_cancellation_alert(user_id, attempt_id, &exam_type)
                .await;
        });

        Ok(())
    }

    /// Records an out-of-band integrity incident, independent of the strike
    /// counter. Details are sanitized before storage.
    pub async fn report_incident(
        &self,
        attempt_id: i64,
        req: ReportIncidentRequest,
    ) -> Result<Incident, AppError> {
        // The attempt must exist, but incidents never mutate it.
        self.require_attempt(attempt_id).await?;

        let severity = req.severity.unwrap_or_else(|| "medium".to_string());
        let details = req.details.map(|d| clean_text(&d));

        let incident = sqlx::query_as::<_, Incident>(
            r#"
            INSERT INTO incidents (attempt_id, source, incident_type, severity, status, details)
            VALUES ($1, 'client', $2, $3, 'open', $4)
            RETURNING id, attempt_id, source, incident_type, severity, status, details, created_at
            "#,
        )
        .bind(attempt_id)
        .bind(&req.incident_type)
        .bind(&severity)
        .bind(&details)
        .fetch_one(self.ledger_pool())
        .await?;

        Ok(incident)
    }

    pub async fn list_incidents(&self) -> Result<Vec<Incident>, AppError> {
        let incidents = sqlx::query_as::<_, Incident>(
            r#"
            SELECT id, attempt_id, source, incident_type, severity, status, details, created_at
            FROM incidents
            ORDER BY id DESC
            "#,
        )
        .fetch_all(self.ledger_pool())
        .await?;

        Ok(incidents)
    }

    fn ledger_pool(&self) -> &PgPool {
        self.ledger.pool()
    }
}

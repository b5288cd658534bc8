// src/services/package_store.rs

use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::package::{PackageRow, PackageStatus, QuestionPackage};

/// Document-oriented store for question packages: one JSONB document per
/// attempt, addressed by an opaque UUID reference.
///
/// Writes happen in their own round-trips, never inside a transaction shared
/// with the relational ledger. A crash between "attempt row committed" and
/// "package backfilled" leaves a recoverable-but-incomplete attempt; the gap
/// is documented in DESIGN.md.
#[derive(Clone)]
pub struct PackageStore {
    pool: PgPool,
}

impl PackageStore {
    pub fn new(pool: PgPool) -> Self {
        PackageStore { pool }
    }

    /// Persists a new package in 'draft' status and returns its reference.
    pub async fn insert(
        &self,
        attempt_id: i64,
        doc: &QuestionPackage,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO question_packages (id, attempt_id, status, doc)
            VALUES ($1, $2, 'draft', $3)
            "#,
        )
        .bind(id)
        .bind(attempt_id)
        .bind(Json(doc))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn fetch(&self, package_ref: Uuid) -> Result<Option<PackageRow>, AppError> {
        let row = sqlx::query_as::<_, PackageRow>(
            r#"
            SELECT id, attempt_id, status, doc, created_at, updated_at
            FROM question_packages
            WHERE id = $1
            "#,
        )
        .bind(package_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Draft to in_progress, first start only; later calls are no-ops.
    pub async fn mark_in_progress(&self, package_ref: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE question_packages
            SET status = 'in_progress', updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            "#,
        )
        .bind(package_ref)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes the graded document back and closes the package.
    pub async fn complete(
        &self,
        package_ref: Uuid,
        doc: &QuestionPackage,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE question_packages
            SET status = 'completed', doc = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(package_ref)
        .bind(Json(doc))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cancellation side effect; terminal states are left alone.
    pub async fn cancel(&self, package_ref: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE question_packages
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'in_progress')
            "#,
        )
        .bind(package_ref)
        .bind(PackageStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

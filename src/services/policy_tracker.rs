// src/services/policy_tracker.rs

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;
use crate::models::policy::{
    AttemptHistoryEntry, Eligibility, PolicyLedger, PolicyLedgerEntry, ledger_key,
};

/// File-backed ledger of attempt counts, cooldowns and manual overrides per
/// `(user, exam_type)`.
///
/// The whole document is read, modified and rewritten on every call, with no
/// file locking: concurrent writers are last-writer-wins. Acceptable under
/// low write concurrency per user; the interface is the seam for swapping in
/// a transactional store.
pub struct PolicyTracker {
    path: PathBuf,
}

impl PolicyTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PolicyTracker { path: path.into() }
    }

    async fn load(&self) -> Result<PolicyLedger, AppError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::InternalServerError(format!(
                        "corrupt policy ledger at {}: {}",
                        self.path.display(),
                        e
                    ))
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PolicyLedger::default()),
            Err(e) => Err(AppError::from(e)),
        }
    }

    async fn store(&self, ledger: &PolicyLedger) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(ledger)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    /// Retake eligibility for `(user, exam_type)` against `max_attempts`.
    ///
    /// An active override wins over both the cooldown and the attempt limit,
    /// and is consumed by this call.
    pub async fn can_attempt(
        &self,
        user_id: i64,
        exam_type: &str,
        max_attempts: i32,
    ) -> Result<Eligibility, AppError> {
        let mut ledger = self.load().await?;
        let key = ledger_key(user_id, exam_type);

        let (override_active, cooldown_until, attempts) = match ledger.entries.get(&key) {
            None => return Ok(Eligibility::Ok),
            Some(e) => (e.override_active, e.cooldown_until, e.attempts),
        };

        if override_active {
            if let Some(entry) = ledger.entries.get_mut(&key) {
                entry.override_active = false;
            }
            self.store(&ledger).await?;
            return Ok(Eligibility::Ok);
        }

        if let Some(until) = cooldown_until {
            if until > Utc::now() {
                return Ok(Eligibility::CooldownActive { until });
            }
        }

        if attempts >= max_attempts.max(0) as u32 {
            return Ok(Eligibility::LimitReached);
        }

        Ok(Eligibility::Ok)
    }

    /// Increments the attempt counter and appends a history entry whose
    /// version is strictly greater than every existing one. Clears any
    /// active override.
    pub async fn record_attempt(&self, user_id: i64, exam_type: &str) -> Result<u32, AppError> {
        let mut ledger = self.load().await?;
        let key = ledger_key(user_id, exam_type);
        let entry = ledger.entries.entry(key).or_insert_with(PolicyLedgerEntry::default);

        let version = entry
            .history
            .iter()
            .map(|h| h.version)
            .max()
            .unwrap_or(0)
            + 1;

        entry.attempts += 1;
        entry.last_attempt_at = Some(Utc::now());
        entry.override_active = false;
        entry.history.push(AttemptHistoryEntry {
            version,
            at: Utc::now(),
        });

        self.store(&ledger).await?;
        Ok(version)
    }

    /// Installs a cooldown expiring `hours` from now. Called after a failed
    /// attempt.
    pub async fn set_cooldown(
        &self,
        user_id: i64,
        exam_type: &str,
        hours: i32,
    ) -> Result<DateTime<Utc>, AppError> {
        let mut ledger = self.load().await?;
        let key = ledger_key(user_id, exam_type);
        let entry = ledger.entries.entry(key).or_insert_with(PolicyLedgerEntry::default);

        let until = Utc::now() + Duration::hours(hours.max(0) as i64);
        entry.cooldown_until = Some(until);

        self.store(&ledger).await?;
        Ok(until)
    }

    /// Administrative escape hatch: the next eligibility check succeeds
    /// regardless of limit or cooldown, then the flag self-clears.
    pub async fn set_override(&self, user_id: i64, exam_type: &str) -> Result<(), AppError> {
        let mut ledger = self.load().await?;
        let key = ledger_key(user_id, exam_type);
        let entry = ledger.entries.entry(key).or_insert_with(PolicyLedgerEntry::default);

        entry.override_active = true;

        self.store(&ledger).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_tracker() -> PolicyTracker {
        let path = std::env::temp_dir().join(format!(
            "examgate-policy-ledger-{}.json",
            uuid::Uuid::new_v4()
        ));
        PolicyTracker::new(path)
    }

    #[tokio::test]
    async fn fresh_user_is_eligible() {
        let tracker = temp_tracker();
        let eligibility = tracker.can_attempt(1, "postcourse", 3).await.unwrap();
        assert_eq!(eligibility, Eligibility::Ok);
    }

    #[tokio::test]
    async fn cooldown_blocks_until_expiry() {
        let tracker = temp_tracker();
        tracker.record_attempt(1, "postcourse").await.unwrap();
        let until = tracker.set_cooldown(1, "postcourse", 24).await.unwrap();

        match tracker.can_attempt(1, "postcourse", 3).await.unwrap() {
            Eligibility::CooldownActive { until: blocked } => assert_eq!(blocked, until),
            other => panic!("expected cooldown, got {:?}", other),
        }

        // An expired cooldown no longer blocks.
        tracker.set_cooldown(1, "postcourse", 0).await.unwrap();
        let eligibility = tracker.can_attempt(1, "postcourse", 3).await.unwrap();
        assert_eq!(eligibility, Eligibility::Ok);
    }

    #[tokio::test]
    async fn limit_blocks_after_max_attempts() {
        let tracker = temp_tracker();
        for _ in 0..3 {
            tracker.record_attempt(2, "postcourse").await.unwrap();
        }
        let eligibility = tracker.can_attempt(2, "postcourse", 3).await.unwrap();
        assert_eq!(eligibility, Eligibility::LimitReached);
    }

    #[tokio::test]
    async fn override_wins_once_then_clears() {
        let tracker = temp_tracker();
        for _ in 0..3 {
            tracker.record_attempt(3, "postcourse").await.unwrap();
        }
        tracker.set_override(3, "postcourse").await.unwrap();

        // Override consumed by the first check.
        assert_eq!(
            tracker.can_attempt(3, "postcourse", 3).await.unwrap(),
            Eligibility::Ok
        );
        assert_eq!(
            tracker.can_attempt(3, "postcourse", 3).await.unwrap(),
            Eligibility::LimitReached
        );
    }

    #[tokio::test]
    async fn history_versions_strictly_increase() {
        let tracker = temp_tracker();
        let v1 = tracker.record_attempt(4, "baseline").await.unwrap();
        let v2 = tracker.record_attempt(4, "baseline").await.unwrap();
        let v3 = tracker.record_attempt(4, "baseline").await.unwrap();
        assert_eq!((v1, v2, v3), (1, 2, 3));
    }

    #[tokio::test]
    async fn record_attempt_clears_override() {
        let tracker = temp_tracker();
        tracker.set_override(5, "postcourse").await.unwrap();
        tracker.record_attempt(5, "postcourse").await.unwrap();
        for _ in 0..2 {
            tracker.record_attempt(5, "postcourse").await.unwrap();
        }
        // Three attempts recorded, override cleared by the first record.
        assert_eq!(
            tracker.can_attempt(5, "postcourse", 3).await.unwrap(),
            Eligibility::LimitReached
        );
    }
}

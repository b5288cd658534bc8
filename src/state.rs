use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::integrations::gateway::GatewayClient;
use crate::integrations::targets::Gateways;
use crate::services::grader::MeanScoreGrader;
use crate::services::ledger::AttemptLedger;
use crate::services::orchestrator::ExamOrchestrator;
use crate::services::package_store::PackageStore;
use crate::services::policy_tracker::PolicyTracker;
use crate::services::proctoring::ProctoringEngine;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub orchestrator: Arc<ExamOrchestrator>,
    pub proctoring: Arc<ProctoringEngine>,
    pub tracker: Arc<PolicyTracker>,
}

impl AppState {
    /// Wires the full service graph from a pool and configuration.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let gateways = Arc::new(Gateways::new(GatewayClient::from_config(&config)));
        let tracker = Arc::new(PolicyTracker::new(&config.policy_ledger_path));

        let orchestrator = Arc::new(ExamOrchestrator::new(
            AttemptLedger::new(pool.clone()),
            PackageStore::new(pool.clone()),
            tracker.clone(),
            gateways.clone(),
            Box::new(MeanScoreGrader),
        ));

        let proctoring = Arc::new(ProctoringEngine::new(
            pool.clone(),
            PackageStore::new(pool.clone()),
            gateways,
        ));

        Self {
            pool,
            config,
            orchestrator,
            proctoring,
            tracker,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

// src/config.rs

use std::env;

use dotenvy::dotenv;
use url::Url;

/// Grade aggregation truncates to this many decimal places, applied only at
/// the boundary (never to intermediate sums).
pub const GRADE_DECIMALS: u32 = 2;

/// Strikes at which a proctored attempt is canceled.
pub const STRIKE_LIMIT: i32 = 3;

/// Fallback exam window when the policy source omits a duration.
pub const DEFAULT_EXAM_DURATION_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,

    /// Base URL of the integration coordinator service.
    pub coordinator_url: String,

    /// This service's identity on the envelope protocol.
    pub service_name: String,

    /// Base64-encoded Ed25519 seed. When absent, envelopes go out unsigned
    /// (low-trust/dev environments).
    pub service_signing_key: Option<String>,

    /// Base64-encoded Ed25519 public key of this service, used by tests and
    /// peers to verify envelopes.
    pub service_verifying_key: Option<String>,

    /// Path of the file-backed policy ledger.
    pub policy_ledger_path: String,

    /// Per-request timeout for outbound gateway calls, in seconds.
    pub gateway_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let coordinator_url = env::var("COORDINATOR_URL")
            .unwrap_or_else(|_| "http://localhost:4400".to_string());
        Url::parse(&coordinator_url).expect("COORDINATOR_URL must be a valid URL");

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "examgate".to_string());

        let service_signing_key = env::var("SERVICE_SIGNING_KEY").ok();
        let service_verifying_key = env::var("SERVICE_VERIFYING_KEY").ok();

        let policy_ledger_path = env::var("POLICY_LEDGER_PATH")
            .unwrap_or_else(|_| "data/policy_ledger.json".to_string());

        let gateway_timeout_secs = env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6);

        Self {
            database_url,
            jwt_secret,
            rust_log,
            coordinator_url,
            service_name,
            service_signing_key,
            service_verifying_key,
            policy_ledger_path,
            gateway_timeout_secs,
        }
    }
}

// tests/exam_flow_tests.rs

use examgate::{config::Config, routes, state::AppState};
use sqlx::postgres::PgPoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// The coordinator URL points at a closed port, so every gateway call runs
/// through the deterministic mock fallback: tests pass with no external
/// systems running.
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let ledger_path = std::env::temp_dir().join(format!(
        "examgate-it-ledger-{}.json",
        uuid::Uuid::new_v4()
    ));

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        rust_log: "error".to_string(),
        coordinator_url: "http://127.0.0.1:1".to_string(),
        service_name: "examgate-tests".to_string(),
        service_signing_key: None,
        service_verifying_key: None,
        policy_ledger_path: ledger_path.to_string_lossy().to_string(),
        gateway_timeout_secs: 1,
    };

    let state = AppState::new(pool, config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Unique user id per test run so the one-baseline-per-user rule does not
/// trip across runs against a shared database.
fn unique_user_id() -> i64 {
    (uuid::Uuid::new_v4().as_u128() & 0x7fff_ffff_ffff) as i64
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn create_requires_user_and_exam_type() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({ "user_id": 0, "exam_type": "baseline" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "user_id_and_exam_type_required");
}

#[tokio::test]
async fn create_rejects_unknown_exam_type() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({ "user_id": unique_user_id(), "exam_type": "midterm" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_exam_type");
}

#[tokio::test]
async fn second_baseline_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_id = unique_user_id();

    let first = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({ "user_id": user_id, "exam_type": "baseline" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({ "user_id": user_id, "exam_type": "baseline" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(second.status().as_u16(), 400);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["error"], "baseline_already_exists");
}

#[tokio::test]
async fn full_baseline_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_id = unique_user_id();

    // 1. Create: policy snapshot comes from the directory mock.
    let created: serde_json::Value = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({ "user_id": user_id, "exam_type": "baseline" }))
        .send()
        .await
        .expect("Create failed")
        .json()
        .await
        .expect("Failed to parse create json");

    let exam_id = created["exam_id"].as_i64().expect("exam_id missing");
    let attempt_id = created["attempt_id"].as_i64().expect("attempt_id missing");
    assert_eq!(created["policy"]["passing_grade"], 70.0);

    // 2. Start: learner view must never contain answer material.
    let start_resp = client
        .post(&format!("{}/api/exams/{}/start", address, exam_id))
        .json(&serde_json::json!({ "attempt_id": attempt_id }))
        .send()
        .await
        .expect("Start failed");
    assert_eq!(start_resp.status().as_u16(), 200);

    let view: serde_json::Value = start_resp.json().await.unwrap();
    let rendered = view.to_string();
    assert!(view["questions"].as_array().map(|a| !a.is_empty()).unwrap_or(false));
    assert!(!rendered.contains("hints"));
    assert!(!rendered.contains("answer_key"));

    // Starting again is an idempotent no-op.
    let restart = client
        .post(&format!("{}/api/exams/{}/start", address, exam_id))
        .json(&serde_json::json!({ "attempt_id": attempt_id }))
        .send()
        .await
        .expect("Restart failed");
    assert_eq!(restart.status().as_u16(), 200);

    // 3. Submit all three mock skills: (80 + 60 + 70) / 3 = 70 -> passed.
    let submit_resp = client
        .post(&format!("{}/api/exams/{}/submit", address, exam_id))
        .json(&serde_json::json!({
            "attempt_id": attempt_id,
            "answers": [
                { "skill_id": "skill-foundations", "score": 80.0 },
                { "skill_id": "skill-applied-practice", "score": 60.0 },
                { "skill_id": "skill-problem-solving", "score": 70.0 }
            ]
        }))
        .send()
        .await
        .expect("Submit failed");
    assert_eq!(submit_resp.status().as_u16(), 200);

    let summary: serde_json::Value = submit_resp.json().await.unwrap();
    assert_eq!(summary["final_grade"], 70.0);
    assert_eq!(summary["passed"], true);
    assert_eq!(summary["per_skill"].as_array().unwrap().len(), 3);

    // 4. A second submit is rejected: the grade is written exactly once.
    let resubmit = client
        .post(&format!("{}/api/exams/{}/submit", address, exam_id))
        .json(&serde_json::json!({
            "attempt_id": attempt_id,
            "answers": [{ "skill_id": "skill-foundations", "score": 100.0 }]
        }))
        .send()
        .await
        .expect("Resubmit failed");
    assert_eq!(resubmit.status().as_u16(), 409);

    // 5. Read projections reflect the submission.
    let attempt: serde_json::Value = client
        .get(&format!("{}/api/attempts/{}", address, attempt_id))
        .send()
        .await
        .expect("Get attempt failed")
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["status"], "completed");
    assert_eq!(attempt["final_grade"], 70.0);
    assert_eq!(attempt["passed"], true);

    let skills: Vec<serde_json::Value> = client
        .get(&format!("{}/api/attempts/{}/skills", address, attempt_id))
        .send()
        .await
        .expect("Get skills failed")
        .json()
        .await
        .unwrap();
    assert_eq!(skills.len(), 3);
    assert!(skills.iter().any(|s| s["status"] == "acquired"));
    assert!(skills.iter().any(|s| s["status"] == "failed"));

    let user_attempts: Vec<serde_json::Value> = client
        .get(&format!("{}/api/attempts/user/{}", address, user_id))
        .send()
        .await
        .expect("List attempts failed")
        .json()
        .await
        .unwrap();
    assert_eq!(user_attempts.len(), 1);
}

#[tokio::test]
async fn submit_detects_exam_mismatch() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_id = unique_user_id();

    let created: serde_json::Value = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({ "user_id": user_id, "exam_type": "baseline" }))
        .send()
        .await
        .expect("Create failed")
        .json()
        .await
        .unwrap();

    let exam_id = created["exam_id"].as_i64().unwrap();
    let attempt_id = created["attempt_id"].as_i64().unwrap();

    let response = client
        .post(&format!("{}/api/exams/{}/submit", address, exam_id + 1))
        .json(&serde_json::json!({
            "attempt_id": attempt_id,
            "answers": [{ "skill_id": "skill-foundations", "score": 50.0 }]
        }))
        .send()
        .await
        .expect("Submit failed");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "exam_mismatch");
}

#[tokio::test]
async fn unknown_attempt_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/exams/1/start", address))
        .json(&serde_json::json!({ "attempt_id": 999_999_999 }))
        .send()
        .await
        .expect("Start failed");

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "attempt_not_found");
}

#[tokio::test]
async fn failed_postcourse_sets_cooldown_and_override_lifts_it() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_id = unique_user_id();

    // Create and fail a postcourse exam.
    let created: serde_json::Value = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({
            "user_id": user_id,
            "exam_type": "postcourse",
            "course_id": 11
        }))
        .send()
        .await
        .expect("Create failed")
        .json()
        .await
        .unwrap();

    let exam_id = created["exam_id"].as_i64().unwrap();
    let attempt_id = created["attempt_id"].as_i64().unwrap();

    let summary: serde_json::Value = client
        .post(&format!("{}/api/exams/{}/submit", address, exam_id))
        .json(&serde_json::json!({
            "attempt_id": attempt_id,
            "answers": [{ "skill_id": "skill-foundations", "score": 10.0 }]
        }))
        .send()
        .await
        .expect("Submit failed")
        .json()
        .await
        .unwrap();
    assert_eq!(summary["passed"], false);

    // The failure installed a cooldown; a rebuild is blocked.
    let blocked = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({
            "user_id": user_id,
            "exam_type": "postcourse",
            "course_id": 11
        }))
        .send()
        .await
        .expect("Create failed");
    assert_eq!(blocked.status().as_u16(), 403);
    let body: serde_json::Value = blocked.json().await.unwrap();
    assert_eq!(body["error"], "retake_cooldown_active");

    // An admin override makes the next create succeed.
    let token = examgate::utils::jwt::sign_jwt(
        1,
        "admin",
        "test_secret_for_integration_tests",
        600,
    )
    .unwrap();

    let override_resp = client
        .post(&format!("{}/api/admin/policy/override", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "user_id": user_id, "exam_type": "postcourse" }))
        .send()
        .await
        .expect("Override failed");
    assert_eq!(override_resp.status().as_u16(), 200);

    let retry = client
        .post(&format!("{}/api/exams", address))
        .json(&serde_json::json!({
            "user_id": user_id,
            "exam_type": "postcourse",
            "course_id": 11
        }))
        .send()
        .await
        .expect("Create failed");
    assert_eq!(retry.status().as_u16(), 201);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/api/admin/policy/override", address))
        .json(&serde_json::json!({ "user_id": 1, "exam_type": "postcourse" }))
        .send()
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 401);
}

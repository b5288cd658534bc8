// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt, exam, proctoring},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (exams, attempts, proctoring, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (AppState).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // let governor_conf = GovernorConfigBuilder::default()
    //     .per_second(2)
    //     .burst_size(5)
    //     .finish()
    //     .unwrap();

    // let governor_conf = Arc::new(governor_conf);

    let exam_routes = Router::new()
        .route("/", post(exam::create_exam))
        .route("/{id}/start", post(exam::start_attempt))
        .route("/{id}/submit", post(exam::submit_attempt));

    let attempt_routes = Router::new()
        .route("/{id}", get(attempt::get_attempt))
        .route("/user/{user_id}", get(attempt::list_user_attempts))
        .route("/{id}/skills", get(attempt::get_attempt_skills));

    let proctoring_routes = Router::new()
        .route("/{attempt_id}/start_camera", post(proctoring::start_camera))
        .route("/{attempt_id}/violation", post(proctoring::report_violation))
        .route("/{attempt_id}/incident", post(proctoring::report_incident));

    let admin_routes = Router::new()
        .route("/policy/override", post(admin::set_policy_override))
        .route("/incidents", get(admin::list_incidents))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/proctoring", proctoring_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // .layer(GovernorLayer::new(governor_conf))
        .with_state(state)
}

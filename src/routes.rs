// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, auth, quiz, results},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, tests, results, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, auth client, config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Session routes
        .merge(
            Router::new()
                .route("/logout", post(auth::logout))
                .route("/me", get(auth::me))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let test_routes = Router::new()
        .route("/", get(quiz::list_tests))
        // Protected test routes
        .merge(
            Router::new()
                .route("/{id}", get(quiz::get_test))
                .route("/{id}/submit", post(quiz::submit_test))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let result_routes = Router::new()
        .route("/", get(results::list_my_results))
        .route("/{id}/answers", get(results::get_result_answers))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/tests", get(admin::list_tests).post(admin::create_test))
        .route("/tests/{id}", delete(admin::delete_test))
        .route("/tests/{id}/questions", post(admin::add_questions))
        .route("/tests/{id}/questions/bulk", post(admin::add_questions_bulk))
        .route("/stats", get(admin::student_stats))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/tests", test_routes)
        .nest("/api/results", result_routes)
        .nest("/api/admin", admin_routes)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

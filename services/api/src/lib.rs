//! services/api/src/lib.rs
//!
//! The HTTP service: configuration, adapters and the axum router.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use web::{auth, consultations, wallet, wizard, AppState};

/// Builds every API route with its identity middleware applied.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/plans", get(wallet::list_plans_handler))
        .route("/experts", get(consultations::list_experts_handler));

    // Wizard routes (logged-in user or guest)
    let wizard_routes = Router::new()
        .route("/interviews", post(wizard::start_interview_handler))
        .route("/career-paths", post(wizard::start_career_path_handler))
        .route(
            "/sessions/{id}/steps/{step}",
            get(wizard::get_step_handler).post(wizard::submit_answer_handler),
        )
        .route("/sessions/{id}/result", get(wizard::result_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            web::resolve_owner,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/wallet", get(wallet::wallet_handler))
        .route("/plans/{id}/subscribe", post(wallet::subscribe_handler))
        .route("/sessions", get(wizard::list_sessions_handler))
        .route(
            "/consultations",
            get(consultations::list_consultations_handler)
                .post(consultations::create_consultation_handler),
        )
        .route(
            "/consultations/{id}",
            get(consultations::consultation_detail_handler),
        )
        .route(
            "/consultations/{id}/actions/{action}",
            post(consultations::consultation_action_handler),
        )
        .route(
            "/consultations/{id}/rating",
            post(consultations::rate_consultation_handler),
        )
        .route(
            "/consultations/{id}/messages",
            get(consultations::list_messages_handler).post(consultations::send_message_handler),
        )
        .route(
            "/consultations/{id}/attachments",
            post(consultations::attach_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            web::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(wizard_routes)
        .merge(protected_routes)
        .with_state(app_state)
}

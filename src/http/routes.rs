use axum::extract::DefaultBodyLimit;
use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user))
        // Account management (authenticated user's own account)
        .route(
            "/account",
            patch(handlers::update_profile).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/account", delete(handlers::delete_account))
}

pub fn items(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/items/lost",
            post(handlers::submit_lost_item).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/items/found",
            post(handlers::submit_found_item).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/items", get(handlers::list_items))
        .route("/items/recent", get(handlers::recent_items))
        .route("/items/:kind/form", get(handlers::report_form))
        .route("/items/:kind/:id", get(handlers::get_item))
        .route("/items/:kind/:id/claim", post(handlers::claim_item))
}

pub fn notifications() -> Router<AppState> {
    Router::new().route("/notifications", get(handlers::list_notifications))
}

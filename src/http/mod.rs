use axum::middleware::from_fn_with_state;
use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod middleware;
mod multipart;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

use self::middleware::rate_limit::{ip_rate_limit_middleware, rate_limit_middleware};

/// Extra room over the image cap for the text fields of a multipart form, so
/// an oversized image still reaches field validation.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.image_max_bytes + FORM_OVERHEAD_BYTES;

    let auth = routes::auth().route_layer(from_fn_with_state(
        state.clone(),
        ip_rate_limit_middleware,
    ));
    let items = routes::items(body_limit).route_layer(from_fn_with_state(
        state.clone(),
        rate_limit_middleware,
    ));

    let api = Router::new()
        .merge(routes::health())
        .merge(auth)
        .merge(routes::users(body_limit))
        .merge(items)
        .merge(routes::notifications());

    Router::new().nest("/v1", api).with_state(state)
}

use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::config::rate_limits::RateAction;
use crate::http::{AppError, AuthUser};
use crate::AppState;

/// Per-user limits on report submission and claims.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    let action = match *request.method() {
        Method::POST if path.ends_with("/claim") => Some(RateAction::Claim),
        Method::POST if path.ends_with("/items/lost") || path.ends_with("/items/found") => {
            Some(RateAction::SubmitReport)
        }
        _ => None,
    };

    // Unauthenticated requests are rejected by the handler's extractor.
    let (Some(action), Some(auth_user)) = (action, auth) else {
        return Ok(next.run(request).await);
    };

    enforce(&state, action, &auth_user.user_id.to_string()).await?;
    Ok(next.run(request).await)
}

/// IP-based rate limiting for unauthenticated endpoints (login, registration)
pub async fn ip_rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    let action = match *request.method() {
        Method::POST if path.ends_with("/auth/login") => Some(RateAction::Login),
        Method::POST if path.ends_with("/auth/register") => Some(RateAction::Register),
        _ => None,
    };

    let Some(action) = action else {
        return Ok(next.run(request).await);
    };

    enforce(&state, action, &addr.ip().to_string()).await?;
    Ok(next.run(request).await)
}

async fn enforce(state: &AppState, action: RateAction, subject: &str) -> Result<(), AppError> {
    let rate_limiter = state.rate_limiter();
    let info = rate_limiter
        .check(action, subject)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to check rate limit");
            AppError::internal("failed to check rate limit")
        })?;

    if info.limited {
        tracing::warn!(
            subject = subject,
            action = action.as_str(),
            limit = info.limit,
            "rate limit exceeded"
        );
        return Err(AppError::rate_limited(format!(
            "Rate limit exceeded for action: {}. Please try again later.",
            action.as_str()
        )));
    }

    if let Err(err) = rate_limiter.increment(action, subject).await {
        tracing::warn!(error = ?err, "failed to increment rate limit counter");
    }

    Ok(())
}

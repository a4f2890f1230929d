use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::claims::ClaimOutcome;
use crate::app::reports::{ItemListing, SearchFilters, SubmitOutcome, SubmittedReport};
use crate::app::users::ProfileOutcome;
use crate::app::validation::{self, RawRegistration, ALLOWED_IMAGE_TYPES};
use crate::domain::item::{ItemReport, ItemType, ReportKind};
use crate::domain::notification::Notification;
use crate::domain::user::{PublicUser, User};
use crate::http::multipart::FormData;
use crate::http::{AppError, AuthUser};
use crate::infra::db::{constraint_violation, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};
use crate::AppState;

const RECENT_ITEMS: i64 = 3;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .split_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn parse_kind(kind: &str) -> Result<ReportKind, AppError> {
    ReportKind::from_path(kind).ok_or_else(|| AppError::not_found("unknown item kind"))
}

/// Maps unique violations on users to a 409 naming the taken field.
fn user_conflict(err: &anyhow::Error) -> Option<AppError> {
    let (code, constraint) = constraint_violation(err)?;
    if code != UNIQUE_VIOLATION {
        return None;
    }
    if constraint.contains("users_username_key") {
        return Some(AppError::conflict("Username already taken"));
    }
    if constraint.contains("users_email_key") {
        return Some(AppError::conflict("Email already taken"));
    }
    None
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RawRegistration>,
) -> Result<Json<User>, AppError> {
    let registration = validation::validate_registration(payload).map_err(AppError::validation)?;

    let user = state
        .auth_service()
        .register(registration)
        .await
        .map_err(|err| {
            if let Some(conflict) = user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<crate::app::auth::TokenPair> for AuthTokenResponse {
    fn from(tokens: crate::app::auth::TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = state
        .auth_service()
        .login(&payload.username, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    tokens
        .map(|tokens| Json(tokens.into()))
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = state
        .auth_service()
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    tokens
        .map(|tokens| Json(tokens.into()))
        .ok_or_else(|| AppError::unauthorized("invalid refresh token"))
}

/// Revokes the refresh token. Unknown or already revoked tokens are not an
/// error, so logging out twice is harmless.
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    state
        .auth_service()
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = state.user_service().get_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    user.map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn get_user(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let user = state.user_service().get_user(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    user.map(|user| Json(user.into()))
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<User>, AppError> {
    let form = FormData::read(multipart, "profile_image").await?;

    let outcome = state
        .user_service()
        .update_profile(auth.user_id, form.into_profile())
        .await
        .map_err(|err| {
            if let Some(conflict) = user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match outcome {
        ProfileOutcome::Updated(user) => Ok(Json(user)),
        ProfileOutcome::Invalid(errors) => Err(AppError::validation(errors)),
        ProfileOutcome::Missing => Err(AppError::not_found("user not found")),
    }
}

pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .user_service()
        .delete_account(auth.user_id)
        .await
        .map_err(|err| {
            if let Some((code, _)) = constraint_violation(&err) {
                if code == FOREIGN_KEY_VIOLATION {
                    return AppError::conflict("account still has reports or notifications");
                }
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to delete account");
            AppError::internal("failed to delete account")
        })?;

    if deleted {
        tracing::info!(user_id = %auth.user_id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found"))
    }
}

pub async fn submit_lost_item(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmittedReport>), AppError> {
    let form = FormData::read(multipart, "image").await?;
    let outcome = state
        .report_service()
        .submit_lost(auth.user_id, form.into_report())
        .await;
    submitted(outcome, auth.user_id)
}

pub async fn submit_found_item(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmittedReport>), AppError> {
    let form = FormData::read(multipart, "image").await?;
    let outcome = state
        .report_service()
        .submit_found(auth.user_id, form.into_report())
        .await;
    submitted(outcome, auth.user_id)
}

fn submitted(
    outcome: anyhow::Result<SubmitOutcome>,
    user_id: Uuid,
) -> Result<(StatusCode, Json<SubmittedReport>), AppError> {
    let outcome = outcome.map_err(|err| {
        tracing::error!(error = ?err, user_id = %user_id, "failed to submit report");
        AppError::internal("failed to submit report")
    })?;

    match outcome {
        SubmitOutcome::Created(report) => Ok((StatusCode::CREATED, Json(report))),
        SubmitOutcome::Invalid(errors) => Err(AppError::validation(errors)),
    }
}

#[derive(Deserialize)]
pub struct ItemSearchQuery {
    pub q: Option<String>,
    pub location: Option<String>,
    pub item_type: Option<String>,
    pub kind: Option<String>,
}

pub async fn list_items(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ItemSearchQuery>,
) -> Result<Json<ItemListing>, AppError> {
    const MAX_QUERY_LEN: usize = 200;
    const MAX_LOCATION_LEN: usize = 300;

    let non_blank = |value: Option<String>| {
        value
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let search = non_blank(query.q);
    if search.as_ref().is_some_and(|q| q.chars().count() > MAX_QUERY_LEN) {
        return Err(AppError::bad_request("q must be at most 200 characters"));
    }
    let location = non_blank(query.location);
    if location.as_ref().is_some_and(|l| l.chars().count() > MAX_LOCATION_LEN) {
        return Err(AppError::bad_request("location must be at most 300 characters"));
    }
    let item_type = match non_blank(query.item_type) {
        Some(value) => Some(
            ItemType::from_db(&value).ok_or_else(|| AppError::bad_request("unknown item_type"))?,
        ),
        None => None,
    };
    let kind = match non_blank(query.kind) {
        Some(value) => Some(
            ReportKind::from_path(&value).ok_or_else(|| AppError::bad_request("unknown kind"))?,
        ),
        None => None,
    };

    let filters = SearchFilters {
        query: search,
        location,
        item_type,
        kind,
    };

    let listing = state.report_service().list(&filters).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list items");
        AppError::internal("failed to list items")
    })?;

    Ok(Json(listing))
}

pub async fn recent_items(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ItemListing>, AppError> {
    let listing = state
        .report_service()
        .recent(RECENT_ITEMS)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list recent items");
            AppError::internal("failed to list recent items")
        })?;

    Ok(Json(listing))
}

#[derive(Serialize)]
pub struct ItemTypeChoice {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct ReportFormResponse {
    pub kind: ReportKind,
    pub location_label: &'static str,
    pub location_help: &'static str,
    pub location_placeholder: &'static str,
    pub item_types: Vec<ItemTypeChoice>,
    pub image_types: &'static [&'static str],
    pub image_max_bytes: usize,
}

pub async fn report_form(
    Path(kind): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReportFormResponse>, AppError> {
    let kind = parse_kind(&kind)?;

    Ok(Json(ReportFormResponse {
        kind,
        location_label: kind.location_label(),
        location_help: kind.location_help(),
        location_placeholder: kind.location_placeholder(),
        item_types: ItemType::ALL
            .iter()
            .map(|item_type| ItemTypeChoice {
                value: item_type.as_db(),
                label: item_type.label(),
            })
            .collect(),
        image_types: &ALLOWED_IMAGE_TYPES,
        image_max_bytes: state.image_max_bytes,
    }))
}

pub async fn get_item(
    Path((kind, id)): Path<(String, Uuid)>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ItemReport>, AppError> {
    let kind = parse_kind(&kind)?;
    let report = state.report_service().get(kind, id).await.map_err(|err| {
        tracing::error!(error = ?err, item_id = %id, "failed to fetch item");
        AppError::internal("failed to fetch item")
    })?;

    report
        .map(Json)
        .ok_or_else(|| AppError::not_found("item not found"))
}

#[derive(Serialize)]
pub struct ClaimResponse {
    pub message: &'static str,
    pub notification: Notification,
}

pub async fn claim_item(
    Path((kind, id)): Path<(String, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ClaimResponse>), AppError> {
    let kind = parse_kind(&kind)?;
    let outcome = state
        .claim_service()
        .claim(kind, id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, item_id = %id, user_id = %auth.user_id, "failed to claim item");
            AppError::internal("failed to claim item")
        })?;

    match outcome {
        ClaimOutcome::Notified(notification) => Ok((
            StatusCode::CREATED,
            Json(ClaimResponse {
                message: "You have successfully submitted a claim for the item. The owner will be notified.",
                notification,
            }),
        )),
        ClaimOutcome::ItemNotFound => Err(AppError::not_found("item not found")),
        ClaimOutcome::OwnItem => Err(AppError::bad_request("cannot claim your own item")),
    }
}

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Notification>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let mut notifications = state
        .notification_service()
        .list(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    let next_cursor = if notifications.len() > limit as usize {
        notifications.truncate(limit as usize);
        notifications.last().map(|last| (last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: notifications,
        next_cursor: encode_cursor(next_cursor),
    }))
}

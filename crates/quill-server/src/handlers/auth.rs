//! Authentication handlers

use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::services::AuthSession;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use quill_core::{ProfileUpdate, User, UserLogin, UserRegistration};
use tracing::info;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<UserRegistration>,
) -> ApiResult<(StatusCode, Json<AuthSession>)> {
    info!("Registration attempt for: {}", req.username);
    let session = state.auth_service.register(req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<UserLogin>,
) -> ApiResult<Json<AuthSession>> {
    info!("Login attempt for: {}", req.username);
    let session = state.auth_service.login(req).await?;
    info!("Login successful for: {}", session.user.username);
    Ok(Json(session))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> StatusCode {
    state.auth_service.logout(&auth.claims);
    StatusCode::NO_CONTENT
}

pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    let user = state
        .auth_service
        .update_profile(auth.user.id, update)
        .await?;
    Ok(Json(user))
}

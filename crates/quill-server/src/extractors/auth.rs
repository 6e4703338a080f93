//! Auth extractors for protected routes

use crate::error::ApiError;
use crate::services::Claims;
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use quill_core::{QuillError, User};

/// Authenticated user, resolved from an `Authorization: Bearer` token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

impl AuthUser {
    /// Owners may edit their rows; rows without an owner belong to admins.
    pub fn can_edit(&self, owner: Option<quill_core::Id>) -> bool {
        self.user.is_admin() || owner == Some(self.user.id)
    }

    pub fn ensure_can_edit(&self, owner: Option<quill_core::Id>, what: &str) -> Result<(), ApiError> {
        if self.can_edit(owner) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("You may not modify this {}", what)))
        }
    }
}

/// Like [`AuthUser`], but anonymous requests are let through.
/// A token that is present must still be valid.
#[derive(Clone, Debug)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".to_string()))?;
    Ok(Some(token))
}

async fn resolve(token: &str, state: &AppState) -> Result<AuthUser, ApiError> {
    let claims = state.auth_service.validate_token(token)?;
    let user_id = claims.user_id()?;

    let user = state
        .storage
        .user_by_id(user_id)
        .await?
        .ok_or_else(|| QuillError::AuthenticationFailed("User not found".to_string()))?;

    Ok(AuthUser { user, claims })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
        resolve(token, state).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeAuthUser(Some(resolve(token, state).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}

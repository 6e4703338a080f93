//! Media metadata handlers. File bytes are stored elsewhere.

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quill_core::{Id, Media, NewMedia, Validate};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMediaRequest {
    filename: String,
    file_path: String,
    file_type: String,
    file_size: i64,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Media>>> {
    Ok(Json(state.storage.all_media().await?))
}

pub async fn show(State(state): State<AppState>, Path(id): Path<Id>) -> ApiResult<Json<Media>> {
    state
        .storage
        .media_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Media".to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateMediaRequest>,
) -> ApiResult<(StatusCode, Json<Media>)> {
    let media = NewMedia {
        filename: req.filename,
        file_path: req.file_path,
        file_type: req.file_type,
        file_size: req.file_size,
        user_id: Some(auth.user.id),
    };
    media.validate()?;
    Ok((StatusCode::CREATED, Json(state.storage.create_media(media).await?)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    let media = state
        .storage
        .media_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Media".to_string()))?;
    auth.ensure_can_edit(media.user_id, "media")?;

    if !state.storage.delete_media(id).await? {
        return Err(ApiError::NotFound("Media".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Tag handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quill_core::{slugify, Id, NewTag, Post, Tag, TagPatch, Validate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct TagDetail {
    tag: Tag,
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    name: String,
    slug: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.storage.all_tags().await?))
}

pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<TagDetail>> {
    let tag = state
        .storage
        .tag_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Tag".to_string()))?;
    let posts = state.storage.posts_by_tag(tag.id).await?;
    Ok(Json(TagDetail { tag, posts }))
}

pub async fn create(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let tag = NewTag {
        slug: req.slug.unwrap_or_else(|| slugify(&req.name)),
        name: req.name,
    };
    tag.validate()?;
    Ok((StatusCode::CREATED, Json(state.storage.create_tag(tag).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Id>,
    Json(patch): Json<TagPatch>,
) -> ApiResult<Json<Tag>> {
    patch.validate()?;
    state
        .storage
        .update_tag(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Tag".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    if !state.storage.delete_tag(id).await? {
        return Err(ApiError::NotFound("Tag".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

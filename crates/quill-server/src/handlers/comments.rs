//! Comment handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AuthUser, MaybeAuthUser};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quill_core::{build_threads, Comment, CommentNode, CommentPatch, Id, NewComment, Validate};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    content: String,
    author_name: Option<String>,
    author_email: Option<String>,
    parent_id: Option<Id>,
}

async fn ensure_post(state: &AppState, post_id: Id) -> ApiResult<()> {
    if state.storage.post_by_id(post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post".to_string()));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    Path(post_id): Path<Id>,
) -> ApiResult<Json<Vec<Comment>>> {
    ensure_post(&state, post_id).await?;
    Ok(Json(state.storage.comments_for_post(post_id).await?))
}

pub async fn tree(
    State(state): State<AppState>,
    Path(post_id): Path<Id>,
) -> ApiResult<Json<Vec<CommentNode>>> {
    ensure_post(&state, post_id).await?;
    let comments = state.storage.comments_for_post(post_id).await?;
    Ok(Json(build_threads(comments)))
}

/// Anonymous comments must name their author; signed-in users default to
/// their own name and email.
pub async fn create(
    State(state): State<AppState>,
    MaybeAuthUser(auth): MaybeAuthUser,
    Path(post_id): Path<Id>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let user = auth.map(|auth| auth.user);
    let comment = NewComment {
        content: req.content,
        author_name: req
            .author_name
            .or_else(|| user.as_ref().map(|u| u.byline().to_string()))
            .unwrap_or_default(),
        author_email: req
            .author_email
            .or_else(|| user.as_ref().map(|u| u.email.clone()))
            .unwrap_or_default(),
        user_id: user.as_ref().map(|u| u.id),
        post_id,
        parent_id: req.parent_id,
    };
    comment.validate()?;

    let comment = state.storage.create_comment(comment).await?;
    info!("Comment {} added to post {}", comment.id, post_id);
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Id>,
    Json(patch): Json<CommentPatch>,
) -> ApiResult<Json<Comment>> {
    let existing = state
        .storage
        .comment_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment".to_string()))?;
    auth.ensure_can_edit(existing.user_id, "comment")?;

    patch.validate()?;
    state
        .storage
        .update_comment(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Comment".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    let existing = state
        .storage
        .comment_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment".to_string()))?;
    auth.ensure_can_edit(existing.user_id, "comment")?;

    if !state.storage.delete_comment(id).await? {
        return Err(ApiError::NotFound("Comment".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Post handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use quill_core::ports::Storage;
use quill_core::{
    slugify, Comment, Id, NewPost, NewPostTag, Post, PostPatch, QuillError, Tag, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct PostDetail {
    post: Post,
    tags: Vec<Tag>,
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    title: String,
    slug: Option<String>,
    content: String,
    excerpt: Option<String>,
    cover_image: Option<String>,
    author: Option<String>,
    category_id: Option<Id>,
    published: Option<bool>,
    #[serde(default)]
    tags: Vec<Id>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(flatten)]
    patch: PostPatch,
    /// Replaces the tag set when present
    tags: Option<Vec<Id>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(state.storage.all_posts().await?))
}

pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PostDetail>> {
    let post = state
        .storage
        .post_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;

    let tags = state.storage.tags_for_post(post.id).await?;
    let comments = state.storage.comments_for_post(post.id).await?;
    Ok(Json(PostDetail {
        post,
        tags,
        comments,
    }))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let new_post = NewPost {
        slug: req.slug.unwrap_or_else(|| slugify(&req.title)),
        title: req.title,
        content: req.content,
        excerpt: req.excerpt,
        cover_image: req.cover_image,
        author: req
            .author
            .unwrap_or_else(|| auth.user.byline().to_string()),
        user_id: Some(auth.user.id),
        category_id: req.category_id,
        published: req.published.unwrap_or(true),
    };
    new_post.validate()?;
    ensure_tags_exist(state.storage.as_ref(), &req.tags).await?;

    let post = state.storage.create_post(new_post).await?;
    for tag_id in req.tags {
        state
            .storage
            .add_tag_to_post(NewPostTag {
                post_id: post.id,
                tag_id,
            })
            .await?;
    }

    info!("User {} created post {} ({})", auth.user.id, post.id, post.slug);
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Id>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let existing = state
        .storage
        .post_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;
    auth.ensure_can_edit(existing.user_id, "post")?;

    req.patch.validate()?;
    if let Some(tags) = &req.tags {
        ensure_tags_exist(state.storage.as_ref(), tags).await?;
    }

    let post = state
        .storage
        .update_post(id, req.patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;

    if let Some(tags) = req.tags {
        replace_tags(state.storage.as_ref(), id, tags).await?;
    }

    Ok(Json(post))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    let existing = state
        .storage
        .post_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;
    auth.ensure_can_edit(existing.user_id, "post")?;

    if !state.storage.delete_post(id).await? {
        return Err(ApiError::NotFound("Post".to_string()));
    }
    info!("User {} deleted post {}", auth.user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<Post>>> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Search query is required".to_string()));
    }
    Ok(Json(state.storage.search_posts(query).await?))
}

async fn ensure_tags_exist(storage: &dyn Storage, tag_ids: &[Id]) -> ApiResult<()> {
    for &tag_id in tag_ids {
        if storage.tag_by_id(tag_id).await?.is_none() {
            return Err(QuillError::Validation(format!("tag {} does not exist", tag_id)).into());
        }
    }
    Ok(())
}

/// Make the post's tags exactly `tag_ids`, touching only the links that change
async fn replace_tags(storage: &dyn Storage, post_id: Id, tag_ids: Vec<Id>) -> ApiResult<()> {
    let current: HashSet<Id> = storage
        .tags_for_post(post_id)
        .await?
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    let wanted: HashSet<Id> = tag_ids.into_iter().collect();

    for &tag_id in current.difference(&wanted) {
        storage.remove_tag_from_post(post_id, tag_id).await?;
    }
    for &tag_id in wanted.difference(&current) {
        storage
            .add_tag_to_post(NewPostTag { post_id, tag_id })
            .await?;
    }
    Ok(())
}

/// `PUT /posts/:id/tags/:tag_id`
pub async fn add_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((post_id, tag_id)): Path<(Id, Id)>,
) -> ApiResult<Json<quill_core::PostTag>> {
    let post = state
        .storage
        .post_by_id(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;
    auth.ensure_can_edit(post.user_id, "post")?;

    let link = state
        .storage
        .add_tag_to_post(NewPostTag { post_id, tag_id })
        .await?;
    Ok(Json(link))
}

/// `DELETE /posts/:id/tags/:tag_id`
pub async fn remove_tag(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((post_id, tag_id)): Path<(Id, Id)>,
) -> ApiResult<StatusCode> {
    let post = state
        .storage
        .post_by_id(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post".to_string()))?;
    auth.ensure_can_edit(post.user_id, "post")?;

    if !state.storage.remove_tag_from_post(post_id, tag_id).await? {
        return Err(ApiError::NotFound("Tag link".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Category handlers

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quill_core::{slugify, Category, CategoryPatch, Id, NewCategory, Post, Validate};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    category: Category,
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    name: String,
    slug: Option<String>,
    description: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.storage.all_categories().await?))
}

pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CategoryDetail>> {
    let category = state
        .storage
        .category_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category".to_string()))?;
    let posts = state.storage.posts_by_category(category.id).await?;
    Ok(Json(CategoryDetail { category, posts }))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = NewCategory {
        slug: req.slug.unwrap_or_else(|| slugify(&req.name)),
        name: req.name,
        description: req.description,
    };
    category.validate()?;

    let category = state.storage.create_category(category).await?;
    info!("User {} created category {}", auth.user.id, category.slug);
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Id>,
    Json(patch): Json<CategoryPatch>,
) -> ApiResult<Json<Category>> {
    patch.validate()?;
    state
        .storage
        .update_category(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Category".to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    if !state.storage.delete_category(id).await? {
        return Err(ApiError::NotFound("Category".to_string()));
    }
    info!("User {} deleted category {}", auth.user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

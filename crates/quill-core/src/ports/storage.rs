//! Storage traits for persistence
//!
//! Every backend implements the same contract:
//! - `create_*` returns the persisted row with its generated id and timestamps
//! - `update_*` returns `Ok(None)` when the id does not exist
//! - `delete_*` returns whether a row was removed, clearing dependent rows
//!   first (tag links and comments of a post, tag links of a tag, the
//!   `parent_id` of replies, the `category_id` of posts)
//! - unique column collisions fail with [`QuillError::Conflict`]
//! - `create_user` stores the first account as an admin, whatever role it
//!   was given, in the same write as the insert
//!
//! [`QuillError::Conflict`]: crate::QuillError::Conflict

use crate::Result;
use async_trait::async_trait;
use quill_types::{
    Category, CategoryPatch, Comment, CommentPatch, Id, Media, NewCategory, NewComment, NewMedia,
    NewPost, NewPostTag, NewTag, NewUser, Post, PostPatch, PostTag, Tag, TagPatch, User,
    UserPatch,
};

/// Post store. Lists are ordered newest first.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn all_posts(&self) -> Result<Vec<Post>>;
    async fn post_by_id(&self, id: Id) -> Result<Option<Post>>;
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>>;
    async fn posts_by_category(&self, category_id: Id) -> Result<Vec<Post>>;
    async fn posts_by_tag(&self, tag_id: Id) -> Result<Vec<Post>>;
    /// Case-insensitive substring search over title, content and excerpt
    async fn search_posts(&self, query: &str) -> Result<Vec<Post>>;
    async fn create_post(&self, post: NewPost) -> Result<Post>;
    async fn update_post(&self, id: Id, patch: PostPatch) -> Result<Option<Post>>;
    /// Removes the post along with its comments and tag links
    async fn delete_post(&self, id: Id) -> Result<bool>;
}

/// Category store
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn all_categories(&self) -> Result<Vec<Category>>;
    async fn category_by_id(&self, id: Id) -> Result<Option<Category>>;
    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> Result<Category>;
    async fn update_category(&self, id: Id, patch: CategoryPatch) -> Result<Option<Category>>;
    /// Posts in the category are kept with their category cleared
    async fn delete_category(&self, id: Id) -> Result<bool>;
}

/// Tag store, including the post-tag links
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn all_tags(&self) -> Result<Vec<Tag>>;
    async fn tag_by_id(&self, id: Id) -> Result<Option<Tag>>;
    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>>;
    async fn create_tag(&self, tag: NewTag) -> Result<Tag>;
    async fn update_tag(&self, id: Id, patch: TagPatch) -> Result<Option<Tag>>;
    async fn delete_tag(&self, id: Id) -> Result<bool>;

    async fn tags_for_post(&self, post_id: Id) -> Result<Vec<Tag>>;
    /// Idempotent: an existing link for the pair is returned unchanged
    async fn add_tag_to_post(&self, link: NewPostTag) -> Result<PostTag>;
    async fn remove_tag_from_post(&self, post_id: Id, tag_id: Id) -> Result<bool>;
}

/// Comment store. Lists are ordered oldest first.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn comment_by_id(&self, id: Id) -> Result<Option<Comment>>;
    async fn comments_for_post(&self, post_id: Id) -> Result<Vec<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> Result<Comment>;
    async fn update_comment(&self, id: Id, patch: CommentPatch) -> Result<Option<Comment>>;
    /// Replies to the deleted comment become top-level comments
    async fn delete_comment(&self, id: Id) -> Result<bool>;
}

/// Media store. Lists are ordered newest first.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn all_media(&self) -> Result<Vec<Media>>;
    async fn media_by_id(&self, id: Id) -> Result<Option<Media>>;
    async fn create_media(&self, media: NewMedia) -> Result<Media>;
    async fn delete_media(&self, id: Id) -> Result<bool>;
}

/// User store
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_id(&self, id: Id) -> Result<Option<User>>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn count_users(&self) -> Result<u64>;
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn update_user(&self, id: Id, patch: UserPatch) -> Result<Option<User>>;
}

/// The full storage interface route handlers depend on
pub trait Storage:
    PostStore + CategoryStore + TagStore + CommentStore + MediaStore + UserStore
{
}

impl<T> Storage for T where
    T: PostStore + CategoryStore + TagStore + CommentStore + MediaStore + UserStore
{
}

//! In-memory storage (development backend)
//!
//! All tables live behind one `RwLock`, so id allocation and the cascading
//! deletes are atomic with respect to concurrent requests.

use async_trait::async_trait;
use chrono::Utc;
use quill_core::ports::{CategoryStore, CommentStore, MediaStore, PostStore, TagStore, UserStore};
use quill_core::thread::{check_reply_target, creates_cycle};
use quill_core::{
    Category, CategoryPatch, Comment, CommentPatch, Id, Media, NewCategory, NewComment, NewMedia,
    NewPost, NewPostTag, NewTag, NewUser, Post, PostPatch, PostTag, QuillError, Result, Role, Tag,
    TagPatch, User, UserPatch,
};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Rows keyed by id plus the next id to hand out
struct Table<T> {
    rows: BTreeMap<Id, T>,
    next_id: Id,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn insert_with(&mut self, build: impl FnOnce(Id) -> T) -> T {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: Id) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.values().find(|row| pred(row)).cloned()
    }

    fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.values().filter(|row| pred(row)).cloned().collect()
    }

    fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.rows.values().any(pred)
    }
}

struct Tables {
    posts: Table<Post>,
    categories: Table<Category>,
    tags: Table<Tag>,
    post_tags: Table<PostTag>,
    comments: Table<Comment>,
    media: Table<Media>,
    users: Table<User>,
}

pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                posts: Table::new(),
                categories: Table::new(),
                tags: Table::new(),
                post_tags: Table::new(),
                comments: Table::new(),
                media: Table::new(),
                users: Table::new(),
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn unique(taken: bool, what: &str, value: &str) -> Result<()> {
    if taken {
        return Err(QuillError::Conflict(format!("{} '{}' already exists", what, value)));
    }
    Ok(())
}

fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    posts
}

fn oldest_first(mut comments: Vec<Comment>) -> Vec<Comment> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    comments
}

#[async_trait]
impl PostStore for MemoryStorage {
    async fn all_posts(&self) -> Result<Vec<Post>> {
        let t = self.tables.read().await;
        Ok(newest_first(t.posts.filter(|_| true)))
    }

    async fn post_by_id(&self, id: Id) -> Result<Option<Post>> {
        Ok(self.tables.read().await.posts.get(id))
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        Ok(self.tables.read().await.posts.find(|p| p.slug == slug))
    }

    async fn posts_by_category(&self, category_id: Id) -> Result<Vec<Post>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.posts.filter(|p| p.category_id == Some(category_id)),
        ))
    }

    async fn posts_by_tag(&self, tag_id: Id) -> Result<Vec<Post>> {
        let t = self.tables.read().await;
        let post_ids: HashSet<Id> = t
            .post_tags
            .filter(|link| link.tag_id == tag_id)
            .into_iter()
            .map(|link| link.post_id)
            .collect();
        Ok(newest_first(t.posts.filter(|p| post_ids.contains(&p.id))))
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let t = self.tables.read().await;
        Ok(newest_first(t.posts.filter(|p| p.matches(query))))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut t = self.tables.write().await;
        unique(t.posts.any(|p| p.slug == post.slug), "post slug", &post.slug)?;
        if let Some(category_id) = post.category_id {
            if !t.categories.rows.contains_key(&category_id) {
                return Err(QuillError::not_found("category", category_id));
            }
        }

        let now = Utc::now();
        let post = t.posts.insert_with(|id| Post::from_new(id, post, now));
        debug!("Created post {} ({})", post.id, post.slug);
        Ok(post)
    }

    async fn update_post(&self, id: Id, patch: PostPatch) -> Result<Option<Post>> {
        let mut t = self.tables.write().await;
        let Some(mut post) = t.posts.get(id) else {
            return Ok(None);
        };

        patch.apply(&mut post, Utc::now());
        unique(
            t.posts.any(|p| p.id != id && p.slug == post.slug),
            "post slug",
            &post.slug,
        )?;
        if let Some(Some(category_id)) = patch.category_id {
            if !t.categories.rows.contains_key(&category_id) {
                return Err(QuillError::not_found("category", category_id));
            }
        }

        t.posts.rows.insert(id, post.clone());
        debug!("Updated post {}", id);
        Ok(Some(post))
    }

    async fn delete_post(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write().await;
        t.comments.rows.retain(|_, c| c.post_id != id);
        t.post_tags.rows.retain(|_, link| link.post_id != id);
        let removed = t.posts.rows.remove(&id).is_some();
        debug!("Deleted post {}: {}", id, removed);
        Ok(removed)
    }
}

#[async_trait]
impl CategoryStore for MemoryStorage {
    async fn all_categories(&self) -> Result<Vec<Category>> {
        Ok(self.tables.read().await.categories.filter(|_| true))
    }

    async fn category_by_id(&self, id: Id) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(id))
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.find(|c| c.slug == slug))
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let mut t = self.tables.write().await;
        unique(
            t.categories.any(|c| c.name == category.name),
            "category name",
            &category.name,
        )?;
        unique(
            t.categories.any(|c| c.slug == category.slug),
            "category slug",
            &category.slug,
        )?;
        Ok(t.categories
            .insert_with(|id| Category::from_new(id, category)))
    }

    async fn update_category(&self, id: Id, patch: CategoryPatch) -> Result<Option<Category>> {
        let mut t = self.tables.write().await;
        let Some(mut category) = t.categories.get(id) else {
            return Ok(None);
        };

        patch.apply(&mut category);
        unique(
            t.categories
                .any(|c| c.id != id && c.name == category.name),
            "category name",
            &category.name,
        )?;
        unique(
            t.categories
                .any(|c| c.id != id && c.slug == category.slug),
            "category slug",
            &category.slug,
        )?;

        t.categories.rows.insert(id, category.clone());
        Ok(Some(category))
    }

    async fn delete_category(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write().await;
        for post in t.posts.rows.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(t.categories.rows.remove(&id).is_some())
    }
}

#[async_trait]
impl TagStore for MemoryStorage {
    async fn all_tags(&self) -> Result<Vec<Tag>> {
        Ok(self.tables.read().await.tags.filter(|_| true))
    }

    async fn tag_by_id(&self, id: Id) -> Result<Option<Tag>> {
        Ok(self.tables.read().await.tags.get(id))
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        Ok(self.tables.read().await.tags.find(|tag| tag.slug == slug))
    }

    async fn create_tag(&self, tag: NewTag) -> Result<Tag> {
        let mut t = self.tables.write().await;
        unique(t.tags.any(|x| x.name == tag.name), "tag name", &tag.name)?;
        unique(t.tags.any(|x| x.slug == tag.slug), "tag slug", &tag.slug)?;
        Ok(t.tags.insert_with(|id| Tag::from_new(id, tag)))
    }

    async fn update_tag(&self, id: Id, patch: TagPatch) -> Result<Option<Tag>> {
        let mut t = self.tables.write().await;
        let Some(mut tag) = t.tags.get(id) else {
            return Ok(None);
        };

        patch.apply(&mut tag);
        unique(
            t.tags.any(|x| x.id != id && x.name == tag.name),
            "tag name",
            &tag.name,
        )?;
        unique(
            t.tags.any(|x| x.id != id && x.slug == tag.slug),
            "tag slug",
            &tag.slug,
        )?;

        t.tags.rows.insert(id, tag.clone());
        Ok(Some(tag))
    }

    async fn delete_tag(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write().await;
        t.post_tags.rows.retain(|_, link| link.tag_id != id);
        Ok(t.tags.rows.remove(&id).is_some())
    }

    async fn tags_for_post(&self, post_id: Id) -> Result<Vec<Tag>> {
        let t = self.tables.read().await;
        let tag_ids: HashSet<Id> = t
            .post_tags
            .filter(|link| link.post_id == post_id)
            .into_iter()
            .map(|link| link.tag_id)
            .collect();
        Ok(t.tags.filter(|tag| tag_ids.contains(&tag.id)))
    }

    async fn add_tag_to_post(&self, link: NewPostTag) -> Result<PostTag> {
        let mut t = self.tables.write().await;
        if !t.posts.rows.contains_key(&link.post_id) {
            return Err(QuillError::not_found("post", link.post_id));
        }
        if !t.tags.rows.contains_key(&link.tag_id) {
            return Err(QuillError::not_found("tag", link.tag_id));
        }

        if let Some(existing) = t
            .post_tags
            .find(|pt| pt.post_id == link.post_id && pt.tag_id == link.tag_id)
        {
            return Ok(existing);
        }

        Ok(t.post_tags.insert_with(|id| PostTag {
            id,
            post_id: link.post_id,
            tag_id: link.tag_id,
        }))
    }

    async fn remove_tag_from_post(&self, post_id: Id, tag_id: Id) -> Result<bool> {
        let mut t = self.tables.write().await;
        let Some(link) = t
            .post_tags
            .find(|pt| pt.post_id == post_id && pt.tag_id == tag_id)
        else {
            return Ok(false);
        };
        Ok(t.post_tags.rows.remove(&link.id).is_some())
    }
}

#[async_trait]
impl CommentStore for MemoryStorage {
    async fn comment_by_id(&self, id: Id) -> Result<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(id))
    }

    async fn comments_for_post(&self, post_id: Id) -> Result<Vec<Comment>> {
        let t = self.tables.read().await;
        Ok(oldest_first(t.comments.filter(|c| c.post_id == post_id)))
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut t = self.tables.write().await;
        if !t.posts.rows.contains_key(&comment.post_id) {
            return Err(QuillError::not_found("post", comment.post_id));
        }
        if let Some(parent_id) = comment.parent_id {
            check_reply_target(
                comment.post_id,
                parent_id,
                t.comments.rows.get(&parent_id),
            )?;
        }

        let now = Utc::now();
        let comment = t
            .comments
            .insert_with(|id| Comment::from_new(id, comment, now));
        debug!("Created comment {} on post {}", comment.id, comment.post_id);
        Ok(comment)
    }

    async fn update_comment(&self, id: Id, patch: CommentPatch) -> Result<Option<Comment>> {
        let mut t = self.tables.write().await;
        let Some(mut comment) = t.comments.get(id) else {
            return Ok(None);
        };

        if let Some(Some(parent_id)) = patch.parent_id {
            check_reply_target(comment.post_id, parent_id, t.comments.rows.get(&parent_id))?;
            let siblings = t.comments.filter(|c| c.post_id == comment.post_id);
            if creates_cycle(id, parent_id, &siblings) {
                return Err(QuillError::Validation(format!(
                    "comment {} cannot reply to its own descendant {}",
                    id, parent_id
                )));
            }
        }

        patch.apply(&mut comment);
        t.comments.rows.insert(id, comment.clone());
        Ok(Some(comment))
    }

    async fn delete_comment(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write().await;
        for reply in t.comments.rows.values_mut() {
            if reply.parent_id == Some(id) {
                reply.parent_id = None;
            }
        }
        Ok(t.comments.rows.remove(&id).is_some())
    }
}

#[async_trait]
impl MediaStore for MemoryStorage {
    async fn all_media(&self) -> Result<Vec<Media>> {
        let mut media = self.tables.read().await.media.filter(|_| true);
        media.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(media)
    }

    async fn media_by_id(&self, id: Id) -> Result<Option<Media>> {
        Ok(self.tables.read().await.media.get(id))
    }

    async fn create_media(&self, media: NewMedia) -> Result<Media> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        Ok(t.media.insert_with(|id| Media::from_new(id, media, now)))
    }

    async fn delete_media(&self, id: Id) -> Result<bool> {
        Ok(self.tables.write().await.media.rows.remove(&id).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryStorage {
    async fn user_by_id(&self, id: Id) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .find(|u| u.username == username))
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.find(|u| u.email == email))
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.tables.read().await.users.rows.len() as u64)
    }

    async fn create_user(&self, mut user: NewUser) -> Result<User> {
        let mut t = self.tables.write().await;
        unique(
            t.users.any(|u| u.username == user.username),
            "username",
            &user.username,
        )?;
        unique(t.users.any(|u| u.email == user.email), "email", &user.email)?;
        if t.users.rows.is_empty() {
            user.role = Role::Admin;
        }

        let now = Utc::now();
        Ok(t.users.insert_with(|id| User::from_new(id, user, now)))
    }

    async fn update_user(&self, id: Id, patch: UserPatch) -> Result<Option<User>> {
        let mut t = self.tables.write().await;
        let Some(mut user) = t.users.get(id) else {
            return Ok(None);
        };

        patch.apply(&mut user, Utc::now());
        unique(
            t.users.any(|u| u.id != id && u.email == user.email),
            "email",
            &user.email,
        )?;

        t.users.rows.insert(id, user.clone());
        Ok(Some(user))
    }
}

//! SQLite database layer (embedded, no external dependencies)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_core::ports::{CategoryStore, CommentStore, MediaStore, PostStore, TagStore, UserStore};
use quill_core::thread::{check_reply_target, creates_cycle};
use quill_core::{
    Category, CategoryPatch, Comment, CommentPatch, Id, Media, NewCategory, NewComment, NewMedia,
    NewPost, NewPostTag, NewTag, NewUser, Post, PostPatch, PostTag, QuillError, Result, Role, Tag,
    TagPatch, User, UserPatch,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, cover_image, author, user_id, \
                            category_id, published, created_at, updated_at";
const COMMENT_COLUMNS: &str =
    "id, content, author_name, author_email, user_id, post_id, parent_id, created_at";
const MEDIA_COLUMNS: &str = "id, filename, file_path, file_type, file_size, user_id, uploaded_at";
const USER_COLUMNS: &str = "id, username, email, password_hash, role, display_name, bio, \
                            profile_image, created_at, updated_at";

pub struct Database {
    pool: SqlitePool,
}

/// Map driver errors onto the storage contract: unique collisions are conflicts.
fn db_err(e: sqlx::Error) -> QuillError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return QuillError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return QuillError::Validation(db.message().to_string());
        }
    }
    QuillError::Database(e.to_string())
}

impl Database {
    /// Open (creating if missing) the database file and run migrations.
    pub async fn connect(database_path: &str) -> anyhow::Result<Self> {
        info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    )
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to connect to SQLite database at {}: {}",
                    database_path,
                    e
                )
            })?;

        info!("SQLite connection established, running migrations...");
        let db = Self { pool };
        db.run_migrations().await?;
        info!("Database initialization complete");
        Ok(db)
    }

    /// Private in-memory database on a single pooled connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_err)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'author',
                display_name TEXT,
                bio TEXT,
                profile_image TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE,
                description TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                excerpt TEXT,
                cover_image TEXT,
                author TEXT NOT NULL,
                user_id INTEGER REFERENCES users(id),
                category_id INTEGER REFERENCES categories(id),
                published BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id),
                tag_id INTEGER NOT NULL REFERENCES tags(id),
                UNIQUE (post_id, tag_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_email TEXT NOT NULL,
                user_id INTEGER REFERENCES users(id),
                post_id INTEGER NOT NULL REFERENCES posts(id),
                parent_id INTEGER REFERENCES comments(id),
                created_at DATETIME NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                user_id INTEGER REFERENCES users(id),
                uploaded_at DATETIME NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_posts_category ON posts (category_id)",
            "CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags (tag_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id)",
            "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments (parent_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn exists(
        tx: &mut Transaction<'_, Sqlite>,
        table: &str,
        id: Id,
    ) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table);
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn fetch_post(&self, id: Id) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS);
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn fetch_comment(
        tx: &mut Transaction<'_, Sqlite>,
        id: Id,
    ) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS);
        let row: Option<CommentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn fetch_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl PostStore for Database {
    async fn all_posts(&self) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        );
        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn post_by_id(&self, id: Id) -> Result<Option<Post>> {
        self.fetch_post(id).await
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE slug = ?1", POST_COLUMNS);
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn posts_by_category(&self, category_id: Id) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts WHERE category_id = ?1 ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        );
        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn posts_by_tag(&self, tag_id: Id) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {} FROM posts WHERE id IN (SELECT post_id FROM post_tags WHERE tag_id = ?1) \
             ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        );
        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(tag_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        // SQLite's LOWER() only folds ASCII, so matching happens on our side.
        let posts = self.all_posts().await?;
        Ok(posts.into_iter().filter(|p| p.matches(query)).collect())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        if let Some(category_id) = post.category_id {
            if !Self::exists(&mut tx, "categories", category_id).await? {
                return Err(QuillError::not_found("category", category_id));
            }
        }

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO posts (title, slug, content, excerpt, cover_image, author,
                               user_id, category_id, published, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image)
        .bind(&post.author)
        .bind(post.user_id)
        .bind(post.category_id)
        .bind(post.published)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .last_insert_rowid();
        tx.commit().await.map_err(db_err)?;

        debug!("Created post {} ({})", id, post.slug);
        self.fetch_post(id)
            .await?
            .ok_or_else(|| QuillError::not_found("post", id))
    }

    async fn update_post(&self, id: Id, patch: PostPatch) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let sql = format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS);
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some(mut post) = row.map(Post::from) else {
            return Ok(None);
        };

        if let Some(Some(category_id)) = patch.category_id {
            if !Self::exists(&mut tx, "categories", category_id).await? {
                return Err(QuillError::not_found("category", category_id));
            }
        }
        patch.apply(&mut post, Utc::now());

        sqlx::query(
            r#"
            UPDATE posts
            SET title = ?1, slug = ?2, content = ?3, excerpt = ?4, cover_image = ?5,
                author = ?6, category_id = ?7, published = ?8, updated_at = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image)
        .bind(&post.author)
        .bind(post.category_id)
        .bind(post.published)
        .bind(post.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        debug!("Updated post {}", id);
        self.fetch_post(id).await
    }

    async fn delete_post(&self, id: Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM comments WHERE post_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let removed = sqlx::query("DELETE FROM posts WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(db_err)?;
        debug!("Deleted post {}: {}", id, removed);
        Ok(removed)
    }
}

#[async_trait]
impl CategoryStore for Database {
    async fn all_categories(&self) -> Result<Vec<Category>> {
        let rows: Vec<CategoryRow> =
            sqlx::query_as("SELECT id, name, slug, description FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn category_by_id(&self, id: Id) -> Result<Option<Category>> {
        let row: Option<CategoryRow> =
            sqlx::query_as("SELECT id, name, slug, description FROM categories WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let row: Option<CategoryRow> =
            sqlx::query_as("SELECT id, name, slug, description FROM categories WHERE slug = ?1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let id = sqlx::query("INSERT INTO categories (name, slug, description) VALUES (?1, ?2, ?3)")
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.description)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .last_insert_rowid();
        Ok(Category::from_new(id, category))
    }

    async fn update_category(&self, id: Id, patch: CategoryPatch) -> Result<Option<Category>> {
        let Some(mut category) = self.category_by_id(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut category);

        let updated = sqlx::query(
            "UPDATE categories SET name = ?1, slug = ?2, description = ?3 WHERE id = ?4",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();

        Ok((updated > 0).then_some(category))
    }

    async fn delete_category(&self, id: Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("UPDATE posts SET category_id = NULL WHERE category_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let removed = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }
}

#[async_trait]
impl TagStore for Database {
    async fn all_tags(&self) -> Result<Vec<Tag>> {
        let rows: Vec<TagRow> = sqlx::query_as("SELECT id, name, slug FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn tag_by_id(&self, id: Id) -> Result<Option<Tag>> {
        let row: Option<TagRow> = sqlx::query_as("SELECT id, name, slug FROM tags WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let row: Option<TagRow> =
            sqlx::query_as("SELECT id, name, slug FROM tags WHERE slug = ?1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn create_tag(&self, tag: NewTag) -> Result<Tag> {
        let id = sqlx::query("INSERT INTO tags (name, slug) VALUES (?1, ?2)")
            .bind(&tag.name)
            .bind(&tag.slug)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .last_insert_rowid();
        Ok(Tag::from_new(id, tag))
    }

    async fn update_tag(&self, id: Id, patch: TagPatch) -> Result<Option<Tag>> {
        let Some(mut tag) = self.tag_by_id(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut tag);

        let updated = sqlx::query("UPDATE tags SET name = ?1, slug = ?2 WHERE id = ?3")
            .bind(&tag.name)
            .bind(&tag.slug)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();

        Ok((updated > 0).then_some(tag))
    }

    async fn delete_tag(&self, id: Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM post_tags WHERE tag_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let removed = sqlx::query("DELETE FROM tags WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn tags_for_post(&self, post_id: Id) -> Result<Vec<Tag>> {
        let rows: Vec<TagRow> = sqlx::query_as(
            r#"
            SELECT t.id, t.name, t.slug
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?1
            ORDER BY t.id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_tag_to_post(&self, link: NewPostTag) -> Result<PostTag> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        if !Self::exists(&mut tx, "posts", link.post_id).await? {
            return Err(QuillError::not_found("post", link.post_id));
        }
        if !Self::exists(&mut tx, "tags", link.tag_id).await? {
            return Err(QuillError::not_found("tag", link.tag_id));
        }

        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)")
            .bind(link.post_id)
            .bind(link.tag_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let row: PostTagRow = sqlx::query_as(
            "SELECT id, post_id, tag_id FROM post_tags WHERE post_id = ?1 AND tag_id = ?2",
        )
        .bind(link.post_id)
        .bind(link.tag_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(row.into())
    }

    async fn remove_tag_from_post(&self, post_id: Id, tag_id: Id) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM post_tags WHERE post_id = ?1 AND tag_id = ?2")
            .bind(post_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(removed > 0)
    }
}

#[async_trait]
impl CommentStore for Database {
    async fn comment_by_id(&self, id: Id) -> Result<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS);
        let row: Option<CommentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn comments_for_post(&self, post_id: Id) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = ?1 ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS
        );
        let rows: Vec<CommentRow> = sqlx::query_as(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        if !Self::exists(&mut tx, "posts", comment.post_id).await? {
            return Err(QuillError::not_found("post", comment.post_id));
        }
        if let Some(parent_id) = comment.parent_id {
            let parent = Self::fetch_comment(&mut tx, parent_id).await?;
            check_reply_target(comment.post_id, parent_id, parent.as_ref())?;
        }

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO comments (content, author_name, author_email, user_id, post_id,
                                  parent_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&comment.content)
        .bind(&comment.author_name)
        .bind(&comment.author_email)
        .bind(comment.user_id)
        .bind(comment.post_id)
        .bind(comment.parent_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        let created = Self::fetch_comment(&mut tx, id)
            .await?
            .ok_or_else(|| QuillError::not_found("comment", id))?;
        tx.commit().await.map_err(db_err)?;

        debug!("Created comment {} on post {}", id, created.post_id);
        Ok(created)
    }

    async fn update_comment(&self, id: Id, patch: CommentPatch) -> Result<Option<Comment>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let Some(mut comment) = Self::fetch_comment(&mut tx, id).await? else {
            return Ok(None);
        };

        if let Some(Some(parent_id)) = patch.parent_id {
            let parent = Self::fetch_comment(&mut tx, parent_id).await?;
            check_reply_target(comment.post_id, parent_id, parent.as_ref())?;

            let sql = format!("SELECT {} FROM comments WHERE post_id = ?1", COMMENT_COLUMNS);
            let siblings: Vec<Comment> = sqlx::query_as::<_, CommentRow>(&sql)
                .bind(comment.post_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?
                .into_iter()
                .map(Into::into)
                .collect();
            if creates_cycle(id, parent_id, &siblings) {
                return Err(QuillError::Validation(format!(
                    "comment {} cannot reply to its own descendant {}",
                    id, parent_id
                )));
            }
        }
        patch.apply(&mut comment);

        sqlx::query("UPDATE comments SET content = ?1, parent_id = ?2 WHERE id = ?3")
            .bind(&comment.content)
            .bind(comment.parent_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(Some(comment))
    }

    async fn delete_comment(&self, id: Id) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("UPDATE comments SET parent_id = NULL WHERE parent_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let removed = sqlx::query("DELETE FROM comments WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }
}

#[async_trait]
impl MediaStore for Database {
    async fn all_media(&self) -> Result<Vec<Media>> {
        let sql = format!(
            "SELECT {} FROM media ORDER BY uploaded_at DESC, id DESC",
            MEDIA_COLUMNS
        );
        let rows: Vec<MediaRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn media_by_id(&self, id: Id) -> Result<Option<Media>> {
        let sql = format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS);
        let row: Option<MediaRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn create_media(&self, media: NewMedia) -> Result<Media> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO media (filename, file_path, file_type, file_size, user_id, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&media.filename)
        .bind(&media.file_path)
        .bind(&media.file_type)
        .bind(media.file_size)
        .bind(media.user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.media_by_id(id)
            .await?
            .ok_or_else(|| QuillError::not_found("media", id))
    }

    async fn delete_media(&self, id: Id) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM media WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(removed > 0)
    }
}

#[async_trait]
impl UserStore for Database {
    async fn user_by_id(&self, id: Id) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_user("username", username).await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_user("email", email).await
    }

    async fn count_users(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count.max(0) as u64)
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, role, display_name, bio,
                               profile_image, created_at, updated_at)
            VALUES (?1, ?2, ?3,
                    CASE WHEN EXISTS (SELECT 1 FROM users) THEN ?4 ELSE 'admin' END,
                    ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.profile_image)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.user_by_id(id)
            .await?
            .ok_or_else(|| QuillError::not_found("user", id))
    }

    async fn update_user(&self, id: Id, patch: UserPatch) -> Result<Option<User>> {
        let Some(mut user) = self.user_by_id(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut user, Utc::now());

        sqlx::query(
            r#"
            UPDATE users
            SET email = ?1, password_hash = ?2, role = ?3, display_name = ?4, bio = ?5,
                profile_image = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.profile_image)
        .bind(user.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.user_by_id(id).await
    }
}

// Helper structs for sqlx query_as
#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    slug: String,
    content: String,
    excerpt: Option<String>,
    cover_image: Option<String>,
    author: String,
    user_id: Option<i64>,
    category_id: Option<i64>,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRow> for Post {
    fn from(r: PostRow) -> Self {
        Post {
            id: r.id,
            title: r.title,
            slug: r.slug,
            content: r.content,
            excerpt: r.excerpt,
            cover_image: r.cover_image,
            author: r.author,
            user_id: r.user_id,
            category_id: r.category_id,
            published: r.published,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    name: String,
    slug: String,
}

impl From<TagRow> for Tag {
    fn from(r: TagRow) -> Self {
        Tag {
            id: r.id,
            name: r.name,
            slug: r.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostTagRow {
    id: i64,
    post_id: i64,
    tag_id: i64,
}

impl From<PostTagRow> for PostTag {
    fn from(r: PostTagRow) -> Self {
        PostTag {
            id: r.id,
            post_id: r.post_id,
            tag_id: r.tag_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    content: String,
    author_name: String,
    author_email: String,
    user_id: Option<i64>,
    post_id: i64,
    parent_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Comment {
            id: r.id,
            content: r.content,
            author_name: r.author_name,
            author_email: r.author_email,
            user_id: r.user_id,
            post_id: r.post_id,
            parent_id: r.parent_id,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: i64,
    filename: String,
    file_path: String,
    file_type: String,
    file_size: i64,
    user_id: Option<i64>,
    uploaded_at: DateTime<Utc>,
}

impl From<MediaRow> for Media {
    fn from(r: MediaRow) -> Self {
        Media {
            id: r.id,
            filename: r.filename,
            file_path: r.file_path,
            file_type: r.file_type,
            file_size: r.file_size,
            user_id: r.user_id,
            uploaded_at: r.uploaded_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    display_name: Option<String>,
    bio: Option<String>,
    profile_image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            role: Role::parse(&r.role).unwrap_or_default(),
            display_name: r.display_name,
            bio: r.bio,
            profile_image: r.profile_image,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        assert!(db.all_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let db = Database::in_memory().await.unwrap();
        let tag = NewTag {
            name: "Rust".to_string(),
            slug: "rust".to_string(),
        };
        db.create_tag(tag.clone()).await.unwrap();
        let err = db.create_tag(tag).await.unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
    }
}

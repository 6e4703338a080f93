//! Storage layer
//!
//! Two interchangeable backends behind `quill_core::ports::Storage`:
//! SQLite (embedded) for persistence and an in-process store for development.
//! Uses DashMap (in-memory) for the revoked token cache.

pub mod db;
pub mod memory;
pub mod revoked;

pub use db::Database;
pub use memory::MemoryStorage;
pub use revoked::RevokedTokens;

use crate::config::{ServerConfig, StorageBackend};
use anyhow::Context;
use quill_core::ports::Storage;
use std::sync::Arc;
use tracing::info;

/// Open the configured backend
pub async fn open(config: &ServerConfig) -> anyhow::Result<Arc<dyn Storage>> {
    match config.storage {
        StorageBackend::Memory => {
            info!("Using in-memory storage (data is lost on restart)");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageBackend::Sqlite => {
            let db = Database::connect(&config.database_path)
                .await
                .context("Failed to initialize database")?;
            info!("SQLite database initialized at: {}", config.database_path);
            Ok(Arc::new(db))
        }
    }
}

/// Behaviour every backend must share, run against both stores
#[cfg(test)]
mod contract {
    use quill_core::ports::Storage;
    use quill_core::{
        CategoryPatch, CommentPatch, NewCategory, NewComment, NewMedia, NewPost, NewPostTag,
        NewTag, NewUser, PostPatch, QuillError, Role, TagPatch, UserPatch,
    };

    pub fn new_post(title: &str, slug: &str, category_id: Option<i64>) -> NewPost {
        NewPost {
            title: title.to_string(),
            slug: slug.to_string(),
            content: format!("{} content", title),
            excerpt: None,
            cover_image: None,
            author: "Jane Smith".to_string(),
            user_id: None,
            category_id,
            published: true,
        }
    }

    pub fn new_comment(post_id: i64, parent_id: Option<i64>, content: &str) -> NewComment {
        NewComment {
            content: content.to_string(),
            author_name: "Reader".to_string(),
            author_email: "reader@example.com".to_string(),
            user_id: None,
            post_id,
            parent_id,
        }
    }

    fn new_tag(name: &str) -> NewTag {
        NewTag {
            name: name.to_string(),
            slug: name.to_lowercase(),
        }
    }

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: Some(format!("All about {}", name)),
        }
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Author,
            display_name: None,
            bio: None,
            profile_image: None,
        }
    }

    pub async fn create_then_fetch_by_slug(store: &dyn Storage) {
        let created = store
            .create_post(new_post("Getting Started", "getting-started", None))
            .await
            .unwrap();
        assert_eq!(created.id, 1);
        assert!(created.published);

        let fetched = store.post_by_slug("getting-started").await.unwrap();
        assert_eq!(fetched, Some(created.clone()));
        assert_eq!(store.post_by_id(created.id).await.unwrap(), Some(created));
        assert_eq!(store.post_by_slug("missing").await.unwrap(), None);
    }

    pub async fn posts_are_listed_newest_first(store: &dyn Storage) {
        let first = store.create_post(new_post("One", "one", None)).await.unwrap();
        let second = store.create_post(new_post("Two", "two", None)).await.unwrap();

        let ids: Vec<_> = store.all_posts().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    pub async fn delete_post_cascades(store: &dyn Storage) {
        let post = store.create_post(new_post("Doomed", "doomed", None)).await.unwrap();
        let keep = store.create_post(new_post("Kept", "kept", None)).await.unwrap();
        let tag = store.create_tag(new_tag("Rust")).await.unwrap();
        store
            .add_tag_to_post(NewPostTag { post_id: post.id, tag_id: tag.id })
            .await
            .unwrap();
        store
            .add_tag_to_post(NewPostTag { post_id: keep.id, tag_id: tag.id })
            .await
            .unwrap();
        let root = store.create_comment(new_comment(post.id, None, "root")).await.unwrap();
        store
            .create_comment(new_comment(post.id, Some(root.id), "reply"))
            .await
            .unwrap();

        assert!(store.delete_post(post.id).await.unwrap());

        assert_eq!(store.post_by_id(post.id).await.unwrap(), None);
        assert!(store.comments_for_post(post.id).await.unwrap().is_empty());
        assert!(store.tags_for_post(post.id).await.unwrap().is_empty());
        let tagged: Vec<_> = store.posts_by_tag(tag.id).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(tagged, vec![keep.id]);
        assert!(!store.delete_post(post.id).await.unwrap());
    }

    pub async fn add_tag_is_idempotent(store: &dyn Storage) {
        let post = store.create_post(new_post("Tagged", "tagged", None)).await.unwrap();
        let tag = store.create_tag(new_tag("Web")).await.unwrap();
        let link = NewPostTag { post_id: post.id, tag_id: tag.id };

        let first = store.add_tag_to_post(link).await.unwrap();
        let second = store.add_tag_to_post(link).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.tags_for_post(post.id).await.unwrap(), vec![tag.clone()]);

        assert!(store.remove_tag_from_post(post.id, tag.id).await.unwrap());
        assert!(!store.remove_tag_from_post(post.id, tag.id).await.unwrap());

        let err = store
            .add_tag_to_post(NewPostTag { post_id: post.id, tag_id: 99 })
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::NotFound(_)));
    }

    pub async fn delete_tag_removes_links(store: &dyn Storage) {
        let post = store.create_post(new_post("Tagged", "tagged", None)).await.unwrap();
        let tag = store.create_tag(new_tag("Gone")).await.unwrap();
        store
            .add_tag_to_post(NewPostTag { post_id: post.id, tag_id: tag.id })
            .await
            .unwrap();

        assert!(store.delete_tag(tag.id).await.unwrap());
        assert!(store.tags_for_post(post.id).await.unwrap().is_empty());
        assert_eq!(store.tag_by_slug("gone").await.unwrap(), None);
    }

    pub async fn delete_comment_orphans_replies(store: &dyn Storage) {
        let post = store.create_post(new_post("Thread", "thread", None)).await.unwrap();
        let root = store.create_comment(new_comment(post.id, None, "root")).await.unwrap();
        let reply = store
            .create_comment(new_comment(post.id, Some(root.id), "reply"))
            .await
            .unwrap();
        assert_eq!(reply.parent_id, Some(root.id));

        assert!(store.delete_comment(root.id).await.unwrap());

        let remaining = store.comments_for_post(post.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, reply.id);
        assert_eq!(remaining[0].parent_id, None);
    }

    pub async fn comments_are_listed_oldest_first(store: &dyn Storage) {
        let post = store.create_post(new_post("Chat", "chat", None)).await.unwrap();
        let a = store.create_comment(new_comment(post.id, None, "a")).await.unwrap();
        let b = store.create_comment(new_comment(post.id, None, "b")).await.unwrap();

        let ids: Vec<_> = store
            .comments_for_post(post.id)
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    pub async fn reply_must_stay_on_post(store: &dyn Storage) {
        let one = store.create_post(new_post("One", "one", None)).await.unwrap();
        let two = store.create_post(new_post("Two", "two", None)).await.unwrap();
        let on_one = store.create_comment(new_comment(one.id, None, "first")).await.unwrap();

        let err = store
            .create_comment(new_comment(two.id, Some(on_one.id), "stray"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Validation(_)), "{:?}", err);

        let err = store
            .create_comment(new_comment(one.id, Some(404), "dangling"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Validation(_)), "{:?}", err);

        let err = store
            .create_comment(new_comment(404, None, "nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::NotFound(_)), "{:?}", err);
    }

    pub async fn reply_cycles_are_rejected(store: &dyn Storage) {
        let post = store.create_post(new_post("Loop", "loop", None)).await.unwrap();
        let root = store.create_comment(new_comment(post.id, None, "root")).await.unwrap();
        let child = store
            .create_comment(new_comment(post.id, Some(root.id), "child"))
            .await
            .unwrap();

        let patch = CommentPatch {
            parent_id: Some(Some(child.id)),
            ..Default::default()
        };
        let err = store.update_comment(root.id, patch).await.unwrap_err();
        assert!(matches!(err, QuillError::Validation(_)), "{:?}", err);

        let patch = CommentPatch {
            content: Some("edited".to_string()),
            ..Default::default()
        };
        let edited = store.update_comment(child.id, patch).await.unwrap().unwrap();
        assert_eq!(edited.content, "edited");
        assert_eq!(edited.parent_id, Some(root.id));
    }

    pub async fn search_is_case_insensitive(store: &dyn Storage) {
        let mut post = new_post("Introduction to React", "intro-react", None);
        post.excerpt = Some("Hooks and STATE".to_string());
        store.create_post(post).await.unwrap();
        store
            .create_post(new_post("Node basics", "node-basics", None))
            .await
            .unwrap();

        assert_eq!(store.search_posts("react").await.unwrap().len(), 1);
        assert_eq!(store.search_posts("hooks and state").await.unwrap().len(), 1);
        assert_eq!(store.search_posts("CONTENT").await.unwrap().len(), 2);
        assert!(store.search_posts("100%").await.unwrap().is_empty());

        store
            .create_post(new_post("Über Rust", "uber-rust", None))
            .await
            .unwrap();
        assert_eq!(store.search_posts("über").await.unwrap().len(), 1);
        assert_eq!(store.search_posts("ÜBER").await.unwrap().len(), 1);
    }

    pub async fn delete_category_clears_posts(store: &dyn Storage) {
        let category = store.create_category(new_category("Web")).await.unwrap();
        let post = store
            .create_post(new_post("Filed", "filed", Some(category.id)))
            .await
            .unwrap();
        assert_eq!(store.posts_by_category(category.id).await.unwrap().len(), 1);

        assert!(store.delete_category(category.id).await.unwrap());

        let post = store.post_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(post.category_id, None);
        assert_eq!(store.category_by_id(category.id).await.unwrap(), None);
    }

    pub async fn post_category_must_exist(store: &dyn Storage) {
        let err = store
            .create_post(new_post("Lost", "lost", Some(7)))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::NotFound(_)), "{:?}", err);
    }

    pub async fn missing_ids(store: &dyn Storage) {
        assert!(store.update_post(42, PostPatch::default()).await.unwrap().is_none());
        assert!(store
            .update_category(42, CategoryPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(store.update_tag(42, TagPatch::default()).await.unwrap().is_none());
        assert!(store
            .update_comment(42, CommentPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(store.update_user(42, UserPatch::default()).await.unwrap().is_none());

        assert!(!store.delete_post(42).await.unwrap());
        assert!(!store.delete_category(42).await.unwrap());
        assert!(!store.delete_tag(42).await.unwrap());
        assert!(!store.delete_comment(42).await.unwrap());
        assert!(!store.delete_media(42).await.unwrap());
    }

    pub async fn partial_updates(store: &dyn Storage) {
        let mut draft = new_post("Draft", "draft", None);
        draft.excerpt = Some("short".to_string());
        let post = store.create_post(draft).await.unwrap();

        let patch = PostPatch {
            title: Some("Final".to_string()),
            excerpt: Some(None),
            ..Default::default()
        };
        let updated = store.update_post(post.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.slug, "draft");
        assert_eq!(updated.excerpt, None);
        assert!(updated.updated_at >= post.updated_at);

        let category = store.create_category(new_category("News")).await.unwrap();
        let patch = CategoryPatch {
            description: Some(None),
            ..Default::default()
        };
        let updated = store.update_category(category.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.name, "News");
        assert_eq!(updated.description, None);
    }

    pub async fn unique_columns_conflict(store: &dyn Storage) {
        store.create_post(new_post("Same", "same", None)).await.unwrap();
        let err = store
            .create_post(new_post("Same again", "same", None))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);

        store.create_tag(new_tag("Rust")).await.unwrap();
        let err = store.create_tag(new_tag("Rust")).await.unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);

        store
            .create_user(new_user("jane", "jane@example.com"))
            .await
            .unwrap();
        let err = store
            .create_user(new_user("jane", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
        let err = store
            .create_user(new_user("john", "jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);

        store.create_category(new_category("News")).await.unwrap();
        let err = store.create_category(new_category("News")).await.unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
    }

    pub async fn updates_keep_columns_unique(store: &dyn Storage) {
        store.create_post(new_post("Taken", "taken", None)).await.unwrap();
        let post = store.create_post(new_post("Free", "free", None)).await.unwrap();
        let patch = PostPatch {
            slug: Some("taken".to_string()),
            ..Default::default()
        };
        let err = store.update_post(post.id, patch).await.unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
        assert_eq!(store.post_by_id(post.id).await.unwrap().unwrap().slug, "free");

        store.create_category(new_category("News")).await.unwrap();
        let category = store.create_category(new_category("Guides")).await.unwrap();
        for patch in [
            CategoryPatch {
                name: Some("News".to_string()),
                ..Default::default()
            },
            CategoryPatch {
                slug: Some("news".to_string()),
                ..Default::default()
            },
        ] {
            let err = store.update_category(category.id, patch).await.unwrap_err();
            assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
        }

        store.create_tag(new_tag("Rust")).await.unwrap();
        let tag = store.create_tag(new_tag("Go")).await.unwrap();
        for patch in [
            TagPatch {
                name: Some("Rust".to_string()),
                slug: None,
            },
            TagPatch {
                name: None,
                slug: Some("rust".to_string()),
            },
        ] {
            let err = store.update_tag(tag.id, patch).await.unwrap_err();
            assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
        }

        store
            .create_user(new_user("jane", "jane@example.com"))
            .await
            .unwrap();
        let john = store
            .create_user(new_user("john", "john@example.com"))
            .await
            .unwrap();
        let patch = UserPatch {
            email: Some("jane@example.com".to_string()),
            ..Default::default()
        };
        let err = store.update_user(john.id, patch).await.unwrap_err();
        assert!(matches!(err, QuillError::Conflict(_)), "{:?}", err);
        assert_eq!(
            store.user_by_id(john.id).await.unwrap().unwrap().email,
            "john@example.com"
        );
    }

    pub async fn only_the_first_user_is_admin(store: &dyn Storage) {
        let (a, b) = tokio::join!(
            store.create_user(new_user("alice", "alice@example.com")),
            store.create_user(new_user("bob", "bob@example.com")),
        );
        let admins = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|u| u.is_admin())
            .count();
        assert_eq!(admins, 1);

        let carol = store
            .create_user(new_user("carol", "carol@example.com"))
            .await
            .unwrap();
        assert_eq!(carol.role, Role::Author);
    }

    pub async fn users_and_media(store: &dyn Storage) {
        assert_eq!(store.count_users().await.unwrap(), 0);
        let user = store
            .create_user(new_user("writer", "writer@example.com"))
            .await
            .unwrap();
        assert_eq!(store.count_users().await.unwrap(), 1);
        assert_eq!(
            store.user_by_username("writer").await.unwrap().map(|u| u.id),
            Some(user.id)
        );
        assert_eq!(
            store.user_by_email("writer@example.com").await.unwrap().map(|u| u.id),
            Some(user.id)
        );

        let patch = UserPatch {
            role: Some(Role::Admin),
            display_name: Some(Some("The Writer".to_string())),
            ..Default::default()
        };
        let updated = store.update_user(user.id, patch).await.unwrap().unwrap();
        assert!(updated.is_admin());
        assert_eq!(updated.byline(), "The Writer");

        let media = store
            .create_media(NewMedia {
                filename: "cover.png".to_string(),
                file_path: "uploads/cover.png".to_string(),
                file_type: "image/png".to_string(),
                file_size: 2048,
                user_id: Some(user.id),
            })
            .await
            .unwrap();
        assert_eq!(store.all_media().await.unwrap(), vec![media.clone()]);
        assert_eq!(store.media_by_id(media.id).await.unwrap(), Some(media.clone()));
        assert!(store.delete_media(media.id).await.unwrap());
        assert!(store.all_media().await.unwrap().is_empty());
    }
}

macro_rules! storage_contract_tests {
    ($backend:ident, $store:expr) => {
        #[cfg(test)]
        mod $backend {
            use super::contract;

            storage_contract_tests!(@cases $store;
                create_then_fetch_by_slug,
                posts_are_listed_newest_first,
                delete_post_cascades,
                add_tag_is_idempotent,
                delete_tag_removes_links,
                delete_comment_orphans_replies,
                comments_are_listed_oldest_first,
                reply_must_stay_on_post,
                reply_cycles_are_rejected,
                search_is_case_insensitive,
                delete_category_clears_posts,
                post_category_must_exist,
                missing_ids,
                partial_updates,
                unique_columns_conflict,
                updates_keep_columns_unique,
                only_the_first_user_is_admin,
                users_and_media,
            );
        }
    };
    (@cases $store:expr; $($case:ident),* $(,)?) => {
        $(
            #[tokio::test]
            async fn $case() {
                let store = $store;
                contract::$case(&store).await;
            }
        )*
    };
}

storage_contract_tests!(memory_backend, crate::storage::MemoryStorage::new());
storage_contract_tests!(
    sqlite_backend,
    crate::storage::Database::in_memory().await.unwrap()
);

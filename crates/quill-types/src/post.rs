//! Post types

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    /// Byline shown on the post
    pub author: String,
    pub user_id: Option<Id>,
    pub category_id: Option<Id>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Build a freshly persisted post from its insert payload.
    pub fn from_new(id: Id, new: NewPost, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            slug: new.slug,
            content: new.content,
            excerpt: new.excerpt,
            cover_image: new.cover_image,
            author: new.author,
            user_id: new.user_id,
            category_id: new.category_id,
            published: new.published,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive substring match over title, content and excerpt.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self
                .excerpt
                .as_deref()
                .map(|e| e.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

fn default_published() -> bool {
    true
}

/// Insert payload for a post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub author: String,
    #[serde(default)]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub category_id: Option<Id>,
    #[serde(default = "default_published")]
    pub published: bool,
}

/// Partial update for a post. Nullable columns use a double option so that
/// an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub excerpt: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "crate::nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_image: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<Id>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl PostPatch {
    /// Merge the present fields into `post` and bump `updated_at`.
    pub fn apply(&self, post: &mut Post, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(slug) = &self.slug {
            post.slug = slug.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            post.excerpt = excerpt.clone();
        }
        if let Some(cover_image) = &self.cover_image {
            post.cover_image = cover_image.clone();
        }
        if let Some(author) = &self.author {
            post.author = author.clone();
        }
        if let Some(category_id) = self.category_id {
            post.category_id = category_id;
        }
        if let Some(published) = self.published {
            post.published = published;
        }
        post.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Post {
        let now = Utc::now();
        Post::from_new(
            1,
            NewPost {
                title: "Getting Started with React".to_string(),
                slug: "getting-started-with-react".to_string(),
                content: "Hooks and components".to_string(),
                excerpt: Some("Learn the BASICS".to_string()),
                cover_image: None,
                author: "Alex".to_string(),
                user_id: None,
                category_id: Some(2),
                published: true,
            },
            now,
        )
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let post = sample();
        assert!(post.matches("react"));
        assert!(post.matches("HOOKS"));
        assert!(post.matches("basics"));
        assert!(!post.matches("docker"));
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: PostPatch =
            serde_json::from_str(r#"{"title":"New","categoryId":null}"#).unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert_eq!(patch.category_id, Some(None));
        assert!(patch.excerpt.is_none());

        let mut post = sample();
        let before = post.updated_at;
        patch.apply(&mut post, before + chrono::Duration::seconds(1));
        assert_eq!(post.title, "New");
        assert_eq!(post.category_id, None);
        assert_eq!(post.excerpt.as_deref(), Some("Learn the BASICS"));
        assert!(post.updated_at > before);
    }

    #[test]
    fn test_new_post_defaults_to_published() {
        let new: NewPost = serde_json::from_str(
            r#"{"title":"T","slug":"t","content":"c","author":"a"}"#,
        )
        .unwrap();
        assert!(new.published);
        assert!(new.category_id.is_none());
    }
}

//! Demo content for fresh installs

use quill_core::ports::Storage;
use quill_core::{NewCategory, NewComment, NewPost, NewPostTag, NewTag, Result};
use std::collections::HashMap;
use tracing::info;

const CATEGORIES: &[(&str, &str, &str)] = &[
    ("Programming", "programming", "Programming related content"),
    ("Web Development", "web-development", "Web development tutorials and tips"),
    ("Design", "design", "Design inspiration and resources"),
    ("DevOps", "devops", "DevOps techniques and practices"),
];

const TAGS: &[(&str, &str)] = &[
    ("JavaScript", "javascript"),
    ("React", "react"),
    ("CSS", "css"),
    ("Node.js", "nodejs"),
    ("Express", "express"),
    ("TypeScript", "typescript"),
    ("UI/UX", "ui-ux"),
];

struct DemoPost {
    title: &'static str,
    slug: &'static str,
    content: &'static str,
    excerpt: &'static str,
    cover_image: &'static str,
    author: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
}

const POSTS: &[DemoPost] = &[
    DemoPost {
        title: "Getting Started with React",
        slug: "getting-started-with-react",
        content: "# Getting Started with React\n\n\
                  React is a JavaScript library for building user interfaces.\n\n\
                  ## Hooks\n\n\
                  Hooks let you use state and other React features without writing a class.\n",
        excerpt: "Learn the basics of React and get started with building user interfaces \
                  using components and hooks.",
        cover_image: "https://images.unsplash.com/photo-1633356122544-f134324a6cee?auto=format&fit=crop&w=1470&q=80",
        author: "Alex Johnson",
        category: "programming",
        tags: &["react", "typescript"],
    },
    DemoPost {
        title: "CSS Grid Layout: A Comprehensive Guide",
        slug: "css-grid-layout-comprehensive-guide",
        content: "# CSS Grid Layout\n\n\
                  CSS Grid Layout allows two-dimensional layouts to be created on the web.\n\n\
                  ```css\n.container {\n  display: grid;\n  grid-template-columns: repeat(3, 1fr);\n}\n```\n",
        excerpt: "Master CSS Grid Layout with this comprehensive guide. Learn about grid \
                  containers, items, lines, and areas to create powerful layouts.",
        cover_image: "https://images.unsplash.com/photo-1517134191118-9d595e4c8c2b?auto=format&fit=crop&w=1470&q=80",
        author: "Sarah Chen",
        category: "design",
        tags: &["css", "ui-ux"],
    },
    DemoPost {
        title: "Introduction to Express.js",
        slug: "introduction-to-expressjs",
        content: "# Introduction to Express.js\n\n\
                  Express is a minimal and flexible Node.js web application framework.\n",
        excerpt: "Learn the basics of Express.js, a flexible Node.js web application framework \
                  for building web and mobile applications.",
        cover_image: "https://images.unsplash.com/photo-1520085601670-ee14aa5fa3e8?auto=format&fit=crop&w=1470&q=80",
        author: "Michael Brown",
        category: "web-development",
        tags: &["nodejs", "express"],
    },
    DemoPost {
        title: "Understanding Docker for Development",
        slug: "understanding-docker-for-development",
        content: "# Understanding Docker for Development\n\n\
                  Docker packages an application and its dependencies into a container.\n",
        excerpt: "Learn how Docker can improve your development workflow. Understand containers, \
                  basic Docker commands, Dockerfiles, and Docker Compose.",
        cover_image: "https://images.unsplash.com/photo-1561883088-039e53143d73?auto=format&fit=crop&w=1470&q=80",
        author: "David Wilson",
        category: "devops",
        tags: &[],
    },
];

const COMMENTS: &[(&str, &str, &str, &str)] = &[
    (
        "getting-started-with-react",
        "Great introduction to React! Looking forward to more tutorials.",
        "Jane Doe",
        "jane@example.com",
    ),
    (
        "getting-started-with-react",
        "I'm having trouble with hooks. Could you explain them more?",
        "John Smith",
        "john@example.com",
    ),
];

/// Populate an empty store. Returns `false` without writing anything when
/// categories already exist.
pub async fn seed_demo_data(storage: &dyn Storage) -> Result<bool> {
    if !storage.all_categories().await?.is_empty() {
        return Ok(false);
    }

    let mut categories = HashMap::new();
    for (name, slug, description) in CATEGORIES {
        let category = storage
            .create_category(NewCategory {
                name: name.to_string(),
                slug: slug.to_string(),
                description: Some(description.to_string()),
            })
            .await?;
        categories.insert(*slug, category.id);
    }

    let mut tags = HashMap::new();
    for (name, slug) in TAGS {
        let tag = storage
            .create_tag(NewTag {
                name: name.to_string(),
                slug: slug.to_string(),
            })
            .await?;
        tags.insert(*slug, tag.id);
    }

    let mut posts = HashMap::new();
    for demo in POSTS {
        let post = storage
            .create_post(NewPost {
                title: demo.title.to_string(),
                slug: demo.slug.to_string(),
                content: demo.content.to_string(),
                excerpt: Some(demo.excerpt.to_string()),
                cover_image: Some(demo.cover_image.to_string()),
                author: demo.author.to_string(),
                user_id: None,
                category_id: categories.get(demo.category).copied(),
                published: true,
            })
            .await?;

        for tag in demo.tags {
            if let Some(&tag_id) = tags.get(tag) {
                storage
                    .add_tag_to_post(NewPostTag {
                        post_id: post.id,
                        tag_id,
                    })
                    .await?;
            }
        }
        posts.insert(demo.slug, post.id);
    }

    for (slug, content, author_name, author_email) in COMMENTS {
        if let Some(&post_id) = posts.get(slug) {
            storage
                .create_comment(NewComment {
                    content: content.to_string(),
                    author_name: author_name.to_string(),
                    author_email: author_email.to_string(),
                    user_id: None,
                    post_id,
                    parent_id: None,
                })
                .await?;
        }
    }

    info!(
        "Seeded {} categories, {} tags, {} posts and {} comments",
        CATEGORIES.len(),
        TAGS.len(),
        POSTS.len(),
        COMMENTS.len()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, MemoryStorage};
    use quill_core::ports::{CategoryStore, CommentStore, PostStore, TagStore};

    #[tokio::test]
    async fn test_seed_memory() {
        let store = MemoryStorage::new();
        assert!(seed_demo_data(&store).await.unwrap());

        assert_eq!(store.all_categories().await.unwrap().len(), 4);
        assert_eq!(store.all_tags().await.unwrap().len(), 7);
        assert_eq!(store.all_posts().await.unwrap().len(), 4);

        let react = store
            .post_by_slug("getting-started-with-react")
            .await
            .unwrap()
            .unwrap();
        let tag_slugs: Vec<_> = store
            .tags_for_post(react.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.slug)
            .collect();
        assert_eq!(tag_slugs, vec!["react", "typescript"]);
        assert_eq!(store.comments_for_post(react.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_seed_runs_once() {
        let db = Database::in_memory().await.unwrap();
        assert!(seed_demo_data(&db).await.unwrap());
        assert!(!seed_demo_data(&db).await.unwrap());
        assert_eq!(db.all_posts().await.unwrap().len(), 4);
    }
}

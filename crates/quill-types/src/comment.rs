//! Comment types

use crate::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reader comment. `parent_id` points at another comment on the same post
/// when this comment is a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id,
    pub content: String,
    pub author_name: String,
    pub author_email: String,
    pub user_id: Option<Id>,
    pub post_id: Id,
    pub parent_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_new(id: Id, new: NewComment, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content: new.content,
            author_name: new.author_name,
            author_email: new.author_email,
            user_id: new.user_id,
            post_id: new.post_id,
            parent_id: new.parent_id,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub author_name: String,
    pub author_email: String,
    #[serde(default)]
    pub user_id: Option<Id>,
    pub post_id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::nullable::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<Id>>,
}

impl CommentPatch {
    pub fn apply(&self, comment: &mut Comment) {
        if let Some(content) = &self.content {
            comment.content = content.clone();
        }
        if let Some(parent_id) = self.parent_id {
            comment.parent_id = parent_id;
        }
    }
}

/// A comment together with its replies, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, including the root.
    pub fn comment_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }
}

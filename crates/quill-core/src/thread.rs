//! Comment threading
//!
//! Comments are stored flat with an optional `parent_id`. These helpers check
//! reply targets before a write and assemble the flat list into threads for
//! reading.

use crate::{QuillError, Result};
use quill_types::{Comment, CommentNode, Id};
use std::collections::{HashMap, HashSet};

/// A reply must point at an existing comment on the same post.
pub fn check_reply_target(post_id: Id, parent_id: Id, parent: Option<&Comment>) -> Result<()> {
    match parent {
        None => Err(QuillError::Validation(format!(
            "parent comment {} does not exist",
            parent_id
        ))),
        Some(parent) if parent.post_id != post_id => Err(QuillError::Validation(format!(
            "parent comment {} belongs to another post",
            parent_id
        ))),
        Some(_) => Ok(()),
    }
}

/// Whether re-parenting `comment_id` under `parent_id` would close a loop.
/// `siblings` are the comments of the post both belong to.
pub fn creates_cycle(comment_id: Id, parent_id: Id, siblings: &[Comment]) -> bool {
    let parents: HashMap<Id, Option<Id>> =
        siblings.iter().map(|c| (c.id, c.parent_id)).collect();

    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(id) = cursor {
        if id == comment_id {
            return true;
        }
        if !seen.insert(id) {
            // pre-existing loop that does not involve this comment
            return false;
        }
        cursor = parents.get(&id).copied().flatten();
    }
    false
}

/// Replies nested deeper than this are hung off their ancestor at this
/// depth, so a thread stays shallow however long a reply chain grows.
pub const MAX_THREAD_DEPTH: usize = 8;

/// Assemble comments into threads. Roots and replies are ordered oldest
/// first; a comment whose parent is not in the list is treated as a root.
pub fn build_threads(mut comments: Vec<Comment>) -> Vec<CommentNode> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let order: Vec<Id> = comments.iter().map(|c| c.id).collect();
    let rank: HashMap<Id, usize> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let mut children: HashMap<Id, Vec<Id>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in &comments {
        match comment.parent_id {
            Some(parent) if rank.contains_key(&parent) && parent != comment.id => {
                children.entry(parent).or_default().push(comment.id);
            }
            _ => roots.push(comment.id),
        }
    }

    // Walk depth first with an explicit stack: (comment, depth, where it hangs)
    let mut visited = Vec::with_capacity(order.len());
    let mut replies: HashMap<Id, Vec<Id>> = HashMap::new();
    let mut stack: Vec<(Id, usize, Option<Id>)> =
        roots.iter().rev().map(|&id| (id, 0, None)).collect();
    while let Some((id, depth, host)) = stack.pop() {
        visited.push(id);
        if let Some(host) = host {
            replies.entry(host).or_default().push(id);
        }
        let (reply_depth, reply_host) = if depth < MAX_THREAD_DEPTH {
            (depth + 1, Some(id))
        } else {
            (depth, host)
        };
        if let Some(kids) = children.remove(&id) {
            stack.extend(kids.into_iter().rev().map(|kid| (kid, reply_depth, reply_host)));
        }
    }

    // Parents come before their replies in `visited`, so building it
    // backwards finishes every reply before the node that holds it.
    let mut pending: HashMap<Id, Comment> = comments.into_iter().map(|c| (c.id, c)).collect();
    let mut built: HashMap<Id, CommentNode> = HashMap::new();
    for id in visited.iter().rev() {
        let Some(comment) = pending.remove(id) else {
            continue;
        };
        let mut kids = replies.remove(id).unwrap_or_default();
        kids.sort_by_key(|kid| rank.get(kid).copied());
        let nested = kids.iter().filter_map(|kid| built.remove(kid)).collect();
        built.insert(
            *id,
            CommentNode {
                comment,
                replies: nested,
            },
        );
    }

    let mut threads: Vec<CommentNode> = roots.iter().filter_map(|id| built.remove(id)).collect();

    // Anything never reached sits on a parent loop; surface it rather than drop it.
    for id in &order {
        if let Some(comment) = pending.remove(id) {
            threads.push(CommentNode {
                comment,
                replies: Vec::new(),
            });
        }
    }

    threads
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn comment(id: Id, post_id: Id, parent_id: Option<Id>, minutes: i64) -> Comment {
        Comment {
            id,
            content: format!("comment {}", id),
            author_name: "Jane Doe".to_string(),
            author_email: "jane@example.com".to_string(),
            user_id: None,
            post_id,
            parent_id,
            created_at: Utc::now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_build_threads_nests_replies() {
        let comments = vec![
            comment(3, 1, Some(1), 2),
            comment(1, 1, None, 0),
            comment(2, 1, None, 1),
            comment(4, 1, Some(3), 3),
        ];

        let threads = build_threads(comments);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, 1);
        assert_eq!(threads[0].replies[0].comment.id, 3);
        assert_eq!(threads[0].replies[0].replies[0].comment.id, 4);
        assert_eq!(threads[0].comment_count(), 3);
        assert_eq!(threads[1].comment.id, 2);
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn test_missing_parent_becomes_root() {
        let threads = build_threads(vec![comment(5, 1, Some(99), 0)]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, 5);
    }

    #[test]
    fn test_loops_are_not_dropped() {
        let threads = build_threads(vec![comment(1, 1, Some(2), 0), comment(2, 1, Some(1), 1)]);
        let total: usize = threads.iter().map(CommentNode::comment_count).sum();
        assert_eq!(total, 2);
    }

    fn depth(node: &CommentNode) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(node, 0)];
        while let Some((node, d)) = stack.pop() {
            deepest = deepest.max(d);
            stack.extend(node.replies.iter().map(|r| (r, d + 1)));
        }
        deepest
    }

    #[test]
    fn test_long_reply_chain_is_flattened() {
        let chain: Vec<Comment> = (1..=20_000)
            .map(|id| comment(id, 1, if id == 1 { None } else { Some(id - 1) }, id))
            .collect();

        let threads = build_threads(chain);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment_count(), 20_000);
        assert_eq!(depth(&threads[0]), MAX_THREAD_DEPTH);

        // every reply past the cap hangs off the same ancestor, oldest first
        let mut node = &threads[0];
        for _ in 1..MAX_THREAD_DEPTH {
            assert_eq!(node.replies.len(), 1);
            node = &node.replies[0];
        }
        let flattened: Vec<Id> = node.replies.iter().map(|r| r.comment.id).collect();
        let expected: Vec<Id> = (MAX_THREAD_DEPTH as Id + 1..=20_000).collect();
        assert_eq!(flattened, expected);

        let json = serde_json::to_string(&threads).unwrap();
        assert!(json.contains("\"id\":20000"));
    }

    #[test]
    fn test_check_reply_target() {
        let parent = comment(1, 1, None, 0);
        assert!(check_reply_target(1, 1, Some(&parent)).is_ok());
        assert!(matches!(
            check_reply_target(2, 1, Some(&parent)),
            Err(QuillError::Validation(_))
        ));
        assert!(matches!(
            check_reply_target(1, 1, None),
            Err(QuillError::Validation(_))
        ));
    }

    #[test]
    fn test_creates_cycle() {
        let siblings = vec![
            comment(1, 1, None, 0),
            comment(2, 1, Some(1), 1),
            comment(3, 1, Some(2), 2),
        ];
        assert!(creates_cycle(1, 3, &siblings));
        assert!(creates_cycle(2, 2, &siblings));
        assert!(!creates_cycle(3, 1, &siblings));
    }
}

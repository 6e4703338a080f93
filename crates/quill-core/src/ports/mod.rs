//! Port traits (interfaces) for dependency injection

pub mod storage;

pub use storage::{
    CategoryStore, CommentStore, MediaStore, PostStore, Storage, TagStore, UserStore,
};

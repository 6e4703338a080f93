//! Quill Types - pure data definitions shared by the storage ports and the server.
//!
//! Entities are serialized in camelCase, which is the wire format the blog
//! client consumes.

pub mod category;
pub mod comment;
pub mod media;
mod nullable;
pub mod post;
pub mod tag;
pub mod user;

pub use category::*;
pub use comment::*;
pub use media::*;
pub use post::*;
pub use tag::*;
pub use user::*;

/// Store-assigned row identifier
pub type Id = i64;

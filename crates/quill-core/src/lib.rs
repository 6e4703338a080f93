//! Quill Core Library
//!
//! Domain rules shared by every storage backend: the error type, the storage
//! port traits, slug handling, comment threading and payload validation.

// Re-export pure types from quill-types
pub use quill_types::*;

pub mod error;
pub mod ports;
pub mod slug;
pub mod thread;
pub mod validate;

pub use error::{QuillError, Result};
pub use slug::slugify;
pub use thread::build_threads;
pub use validate::Validate;

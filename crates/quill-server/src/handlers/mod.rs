//! HTTP handlers

pub mod auth;
pub mod categories;
pub mod comments;
pub mod health;
pub mod media;
pub mod posts;
pub mod tags;

pub use health::health;

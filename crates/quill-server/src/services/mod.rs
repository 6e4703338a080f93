//! Business logic services

pub mod auth;
pub mod seed;

pub use auth::{AuthService, AuthSession, Claims};
pub use seed::seed_demo_data;

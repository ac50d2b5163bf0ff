//! TaskDesk Authentication and Authorization
//!
//! This crate provides password verification, JWT issuance and
//! validation, and the Axum middleware that turns a bearer token into an
//! authenticated request context and enforces per-route roles.

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use error::AuthError;
pub use jwt::{Claims, Identity, JwtManager};
pub use middleware::{AuthUser, RoleGate, RoleGateLayer, authenticate, require_role};
pub use password::{dummy_hash, hash_password, verify_password};

/// Role name that grants administrative access
pub const ADMIN_ROLE: &str = "admin";

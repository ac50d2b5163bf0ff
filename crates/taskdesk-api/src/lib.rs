//! TaskDesk REST API
//!
//! This crate provides the Axum-based HTTP API for TaskDesk: login,
//! user, role, project and task endpoints behind the token verifier and
//! role gates from `taskdesk-auth`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};

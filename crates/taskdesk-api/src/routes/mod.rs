//! API routes

mod auth;
mod health;
pub mod metrics;
mod roles;
mod tasks;
pub mod types;
mod users;

use axum::{Router, middleware::from_fn_with_state};
use std::sync::Arc;
use taskdesk_auth::authenticate;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
///
/// Everything under `/api` except login runs through the token verifier.
/// Role gates sit on the individual routes behind it.
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let protected = Router::new()
        .merge(users::routes())
        .merge(roles::routes())
        .merge(tasks::routes())
        .route_layer(from_fn_with_state(state.jwt.clone(), authenticate));

    let mut router = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(protected)
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}

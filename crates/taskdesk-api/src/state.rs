//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use taskdesk_auth::JwtManager;
use taskdesk_db::Database;

/// Handle used to render the Prometheus scrape output
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, jwt: Arc<JwtManager>) -> Self {
        Self { db, jwt }
    }
}

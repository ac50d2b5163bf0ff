//! TaskDesk - Task tracking backend with token authentication and role gates

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{BootstrapConfig, Config, LoggingConfig};
use taskdesk_api::{AppState, create_router};
use taskdesk_auth::{ADMIN_ROLE, JwtManager};
use taskdesk_db::utils::normalize_email;
use taskdesk_db::{Database, NewUser, UserStatus};

/// TaskDesk - Task tracking backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "TASKDESK_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "TASKDESK_PORT")]
    port: Option<u16>,

    /// Token signing secret (overrides `auth.jwt_secret`)
    #[arg(long, env = "TASKDESK_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting TaskDesk v{}", env!("CARGO_PKG_VERSION"));

    // Reject a missing or weak secret before touching the database
    let jwt = match build_jwt_manager(args.jwt_secret, &config) {
        Ok(jwt) => Arc::new(jwt),
        Err(e) => {
            error!("Invalid authentication configuration: {:#}", e);
            return Err(e);
        }
    };

    if let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_url)
        .await
        .context("Failed to open database")?;

    bootstrap_admin(&db, &config.bootstrap).await?;

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let state = AppState::new(db, jwt);

    let app = create_router(state, metrics_handle)
        .layer(cors_layer(&config.server.cors_allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer()).init(),
    }
}

/// Resolve the signing secret (CLI/env wins over the file) and build the manager
fn build_jwt_manager(cli_secret: Option<String>, config: &Config) -> Result<JwtManager> {
    let secret = cli_secret
        .or_else(|| config.auth.jwt_secret.clone())
        .context("No JWT secret configured; set auth.jwt_secret or TASKDESK_JWT_SECRET")?;

    let ttl = chrono::Duration::try_seconds(config.auth.token_ttl_secs).with_context(|| {
        format!(
            "auth.token_ttl_secs is out of range: {}",
            config.auth.token_ttl_secs
        )
    })?;
    JwtManager::new(&secret, ttl).context("Rejected JWT settings")
}

/// Create the first admin account on an empty database
async fn bootstrap_admin(db: &Database, config: &BootstrapConfig) -> Result<()> {
    if db.has_users().await? {
        return Ok(());
    }

    let Some(password) = config.admin_password.clone() else {
        warn!("No users exist and bootstrap.admin_password is unset; nobody can log in yet");
        return Ok(());
    };

    let role_id = db
        .get_role_by_name(ADMIN_ROLE)
        .await?
        .map(|r| r.id)
        .context("Built-in admin role is missing")?;

    let email = normalize_email(&config.admin_email);
    let password_hash = tokio::task::spawn_blocking(move || taskdesk_auth::hash_password(&password))
        .await
        .context("Password hashing task failed")??;

    db.insert_user(NewUser {
        name: config.admin_name.clone(),
        email: email.clone(),
        password_hash,
        role_id: Some(role_id),
        status: UserStatus::Active,
        avatar_color: None,
    })
    .await?;

    info!("Created bootstrap admin account: {}", email);
    Ok(())
}

/// Build the CORS layer; an empty origin list allows any origin
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed = origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin: {}", o))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(parsed)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn empty_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("boot.db").display());
        (Database::new(&url).await.unwrap(), dir)
    }

    #[test]
    fn test_jwt_secret_is_required() {
        let config = Config::default();
        assert!(build_jwt_manager(None, &config).is_err());
        assert!(build_jwt_manager(Some("short".to_string()), &config).is_err());
        assert!(build_jwt_manager(Some("cli-secret-of-enough-length".to_string()), &config).is_ok());
    }

    #[test]
    fn test_cli_secret_overrides_file() {
        let mut config = Config::default();
        config.auth.jwt_secret = Some("short".to_string());
        assert!(build_jwt_manager(None, &config).is_err());
        assert!(build_jwt_manager(Some("cli-secret-of-enough-length".to_string()), &config).is_ok());
    }

    #[test]
    fn test_token_ttl_out_of_range_is_a_config_error() {
        let secret = || Some("cli-secret-of-enough-length".to_string());
        let mut config = Config::default();

        for ttl in [0, -60, i64::MAX, i64::MIN, taskdesk_auth::jwt::MAX_TOKEN_TTL_SECS + 1] {
            config.auth.token_ttl_secs = ttl;
            assert!(build_jwt_manager(secret(), &config).is_err(), "ttl {}", ttl);
        }

        config.auth.token_ttl_secs = taskdesk_auth::jwt::MAX_TOKEN_TTL_SECS;
        assert!(build_jwt_manager(secret(), &config).is_ok());
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["http://localhost:5173".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_on_empty_db() {
        let (db, _dir) = empty_db().await;
        let config = BootstrapConfig {
            admin_password: Some("bootstrap-pass".to_string()),
            ..Default::default()
        };

        bootstrap_admin(&db, &config).await.unwrap();
        let admin = db
            .get_user_by_email(&config.admin_email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, ADMIN_ROLE);
        assert!(taskdesk_auth::verify_password("bootstrap-pass", &admin.password_hash));

        // A second run leaves the existing accounts alone
        bootstrap_admin(&db, &config).await.unwrap();
        assert_eq!(db.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_email_is_lowercased() {
        let (db, _dir) = empty_db().await;
        let config = BootstrapConfig {
            admin_email: "Root@TaskDesk.Local".to_string(),
            admin_password: Some("bootstrap-pass".to_string()),
            ..Default::default()
        };

        bootstrap_admin(&db, &config).await.unwrap();
        let admin = db
            .get_user_by_email("root@taskdesk.local")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.email, "root@taskdesk.local");
    }

    #[tokio::test]
    async fn test_bootstrap_without_password_creates_nobody() {
        let (db, _dir) = empty_db().await;
        bootstrap_admin(&db, &BootstrapConfig::default()).await.unwrap();
        assert!(!db.has_users().await.unwrap());
    }
}

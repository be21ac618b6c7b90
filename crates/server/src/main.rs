mod config;
mod cookies;
mod error;
mod extract;
mod routes;
mod session;
mod storage;

use axum::{
    Router,
    extract::FromRef,
    routing::{delete, get, post},
};
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use config::AppConfig;
use storage::Db;

/// How often expired sessions are swept from the database.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

fn api_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/login", get(routes::auth::login))
        .route("/auth/callback/google", get(routes::auth::callback))
        .route("/auth/validate-invite", post(routes::auth::validate_invite))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        // Admin
        .route(
            "/admin/invites",
            get(routes::admin::list_invites).post(routes::admin::create_invite),
        )
        .route("/admin/users", get(routes::admin::list_users))
        // Marketplaces
        .route(
            "/marketplace-types",
            get(routes::marketplaces::list_types),
        )
        .route(
            "/marketplaces",
            get(routes::marketplaces::list).post(routes::marketplaces::create),
        )
        .route("/marketplaces/{id}", delete(routes::marketplaces::delete))
        // Sales
        .route(
            "/sales",
            get(routes::sales::list).put(routes::sales::upsert),
        )
        .route("/sales/statistics", get(routes::sales::statistics))
        .route("/sales/{id}", delete(routes::sales::delete))
}

fn spawn_session_sweeper(db: Db) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let result = {
                let conn = db.conn();
                session::purge_expired(&conn, chrono::Utc::now())
            };
            match result {
                Ok(0) => {}
                Ok(n) => tracing::info!("purged {n} expired sessions"),
                Err(e) => tracing::error!("session sweep failed: {e}"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salesdesk_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Data directory
    let data_dir = std::env::var("SALESDESK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));

    tracing::info!("data directory: {}", data_dir.display());

    // Initialize database
    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    spawn_session_sweeper(db.clone());

    let base_url = config.base_url.clone();
    let state = AppState { db, config };

    let mut app = Router::new().nest("/api", api_router());

    // Serve static files from web build if present
    let web_dir = std::env::var("SALESDESK_WEB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("web/build"));
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(&web_dir).fallback(ServeFile::new(index_html)));
    }

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    tracing::info!("starting server at {base_url}");

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
pub fn test_state() -> AppState {
    AppState {
        db: storage::test_db(),
        config: config::test_config(),
    }
}

//! Quill Server
//!
//! REST API for the Quill blogging platform: posts, categories, tags,
//! threaded comments, media metadata and author accounts.
//!
//! Storage is pluggable: an in-process store for development or SQLite
//! (embedded) for persistence.

mod config;
mod error;
mod extractors;
mod handlers;
mod services;
mod storage;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post, put},
    Router,
};
use quill_core::ports::Storage;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ServerConfig, StorageBackend};
use services::AuthService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub auth_service: Arc<AuthService>,
    pub backend: StorageBackend,
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[FATAL] Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Quill Server v{}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    if let Err(e) = run_server(config).await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: ServerConfig) -> Result<()> {
    info!(
        "Config loaded: bind={}, storage={}, db={}",
        config.bind_address, config.storage, config.database_path
    );
    if config.uses_default_secret() {
        warn!("QUILL_JWT_SECRET not set, using default (insecure for production)");
    }

    let storage = storage::open(&config).await?;

    if config.seed_demo_data {
        let seeded = services::seed_demo_data(storage.as_ref())
            .await
            .context("Failed to seed demo data")?;
        if !seeded {
            info!("Store already has content, skipping demo data");
        }
    }

    let auth_service = Arc::new(AuthService::new(
        storage.clone(),
        config.jwt_secret.clone(),
        config.token_ttl(),
    ));

    let state = AppState {
        storage,
        auth_service,
        backend: config.storage,
    };

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server ready to accept connections");
    axum::serve(listener, app(state))
        .await
        .context("Server error")?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    use handlers::{auth, categories, comments, media, posts, tags};

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/posts", get(posts::list).post(posts::create))
        // GET takes a slug, PUT/DELETE a numeric id
        .route(
            "/posts/:id",
            get(posts::show).put(posts::update).delete(posts::delete),
        )
        .route(
            "/posts/:id/tags/:tag_id",
            put(posts::add_tag).delete(posts::remove_tag),
        )
        .route(
            "/posts/:id/comments",
            get(comments::list).post(comments::create),
        )
        .route("/posts/:id/comments/tree", get(comments::tree))
        .route(
            "/comments/:id",
            put(comments::update).delete(comments::delete),
        )
        .route("/search", get(posts::search))
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/:id",
            get(categories::show)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/tags", get(tags::list).post(tags::create))
        .route(
            "/tags/:id",
            get(tags::show).put(tags::update).delete(tags::delete),
        )
        .route("/media", get(media::list).post(media::create))
        .route("/media/:id", get(media::show).delete(media::delete))
}

//! Team Directory Backend
//!
//! Public JSON API and admin pages for team member profiles, with SQLite
//! persistence and local-disk image storage.

mod admin;
mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod service;
mod storage;
mod upload;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use service::TeamMemberService;
use storage::LocalBlobStore;
use upload::UploadValidator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TeamMemberService>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Team Directory Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Storage path: {:?}", config.storage_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Upload limits: file {}, request {}",
        config.limits.upload_max_filesize,
        config.limits.post_max_size
    );

    if config.admin_psk.is_none() {
        tracing::warn!("No admin PSK configured (TEAM_ADMIN_PSK). Admin pages are unprotected!");
    }

    let pool = db::init_database(&config.db_path).await?;
    tokio::fs::create_dir_all(&config.storage_path).await?;

    let repo = Repository::new(pool);
    tracing::info!("Team members stored: {}", repo.count_members().await?);

    let state = build_state(repo, config.clone());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire the service and its collaborators from configuration.
pub fn build_state(repo: Repository, config: Config) -> AppState {
    let blobs = Arc::new(LocalBlobStore::new(config.storage_path.clone()));
    let validator = UploadValidator::new(config.limits.clone(), tracing::info_span!("upload"));
    let service = TeamMemberService::new(
        repo,
        blobs,
        validator,
        tracing::info_span!("team_members"),
    );

    AppState {
        service: Arc::new(service),
        config: Arc::new(config),
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.admin_psk.clone();
    let body_limit = usize::try_from(state.config.limits.post_max_bytes).unwrap_or(usize::MAX);

    // Public API routes
    let api_routes = Router::new()
        .route(
            "/team-members",
            get(api::list_team_members).post(api::create_team_member),
        )
        .route(
            "/team-members/{id}",
            get(api::get_team_member)
                .put(api::update_team_member)
                .delete(api::delete_team_member),
        );

    // Admin pages behind the PSK layer
    let admin_routes = Router::new()
        .route("/", get(admin::index).post(admin::store))
        .route("/create", get(admin::create_form))
        .route("/{id}", post(admin::update).delete(admin::destroy))
        .route("/{id}/edit", get(admin::edit))
        .route("/{id}/delete", post(admin::destroy))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .nest(admin::ADMIN_BASE, admin_routes)
        .nest_service("/storage", ServeDir::new(&state.config.storage_path))
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod testing;

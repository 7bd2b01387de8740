mod auth;
mod candidates;
mod config;
mod db;
mod errors;
mod extract;
mod feedback;
mod inference;
mod ingest;
mod models;
mod routes;
mod sessions;
mod state;
mod store;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::password::{check_password_strength, hash_password};
use crate::auth::token::TokenService;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::inference::model::load_classifier;
use crate::models::user::{NewUser, UserRole};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{postgres::PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Exoplanet API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and bring the schema up to date
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&db).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));

    // Load the classifier (falls back to an unavailable model if the artifact is missing)
    let classifier = load_classifier(&config.model_path);
    info!(
        "Classifier ready: {} (version {})",
        classifier.is_ready(),
        classifier.model_version()
    );

    let tokens = TokenService::new(&config.jwt_secret, config.access_token_expire_minutes);

    seed_admin(store.as_ref(), &config).await?;

    // Build app state
    let state = AppState {
        store,
        classifier,
        tokens,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Permissive when no origins are configured, otherwise an explicit allow-list.
fn cors_layer(config: &Config) -> Result<CorsLayer> {
    if config.cors_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{o}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

/// Creates the `admin` account on first boot when ADMIN_PASSWORD is set.
async fn seed_admin(store: &dyn Store, config: &Config) -> Result<()> {
    let Some(password) = config.admin_password.clone() else {
        return Ok(());
    };
    if store.user_by_username("admin").await?.is_some() {
        return Ok(());
    }
    if check_password_strength(&password).is_err() {
        warn!("ADMIN_PASSWORD is too short; skipping admin seed");
        return Ok(());
    }

    let password_hash = hash_password(password)
        .await
        .map_err(|e| anyhow::anyhow!("hashing admin password: {e}"))?;
    let admin = store
        .insert_user(NewUser {
            username: "admin".into(),
            email: config.admin_email.to_lowercase(),
            password_hash,
            role: UserRole::Admin,
            full_name: Some("Platform Administrator".into()),
            research_specialization: None,
            organization_id: None,
            bio: None,
        })
        .await?;
    info!("Seeded administrator account {}", admin.id);
    Ok(())
}

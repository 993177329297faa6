mod chat;
mod config;
mod db;
mod errors;
mod kv;
mod llm_client;
mod models;
mod optimize;
mod routes;
mod state;
mod versions;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::chat::registry::SessionRegistry;
use crate::config::Config;
use crate::db::create_pool;
use crate::kv::{KvStore, MemoryStore, RedisStore};
use crate::llm_client::{CompletionClient, GeminiClient};
use crate::routes::build_router;
use crate::state::AppState;

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

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Chat history / version store
    let store = build_kv_store(&config).await?;

    // Initialize LLM client
    let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone())
        .context("Failed to build Gemini client")?;
    info!("LLM client initialized (model: {})", gemini.model());
    let completion: Arc<dyn CompletionClient> = Arc::new(gemini);

    let sessions = Arc::new(
        SessionRegistry::new(store, completion.clone()).with_limits(
            Duration::from_secs(config.session_idle_secs),
            config.max_cached_sessions,
        ),
    );

    let state = AppState {
        db,
        completion,
        sessions,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_kv_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let store = RedisStore::connect(&client)
                .await
                .context("Failed to connect to Redis")?;
            info!("Redis store initialized");
            Ok(Arc::new(store))
        }
        None => {
            warn!("REDIS_URL not set; chat history and versions will not survive a restart");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}

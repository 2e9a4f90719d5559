mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use judge_common::config::Config;
use judge_common::redis::RedisStore;
use judge_engine::fallback::LocalFallbackExecutor;
use judge_engine::remote::{RemoteClient, RemoteConfig};
use judge_engine::{JudgeEngine, LanguageRegistry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::metrics::Metrics;

pub struct AppState {
    pub engine: JudgeEngine,
    pub metrics: Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Judge API booting...");

    let config = Config::from_env();

    let store = Arc::new(
        RedisStore::connect(&config.redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?,
    );
    info!(redis_url = %config.redis_url, "Connected to Redis");

    let engine = build_engine(&config, store)?;
    let metrics = Metrics::new().context("Failed to register metrics")?;
    let state = Arc::new(AppState { engine, metrics });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "HTTP server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn build_engine(config: &Config, store: Arc<RedisStore>) -> Result<JudgeEngine> {
    let registry = LanguageRegistry::load_or_builtin(&config.languages_path)?;
    info!(languages = registry.languages().len(), "Language registry loaded");

    let fallback = LocalFallbackExecutor::from_settings(&config.fallback)
        .context("Failed to initialize fallback runtime")?;

    let engine = JudgeEngine::new(registry, Arc::new(fallback), store.clone(), store.clone(), store);

    match &config.remote {
        Some(settings) => {
            let client = RemoteClient::new(RemoteConfig::from_settings(settings))
                .context("Failed to create sandbox client")?;
            info!(base_url = %settings.base_url, "Remote sandbox configured");
            Ok(engine.with_remote(Arc::new(client)))
        }
        None => {
            warn!("JUDGE0_URL not set, every request will use the local fallback");
            Ok(engine)
        }
    }
}

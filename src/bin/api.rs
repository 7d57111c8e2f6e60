//! glycotrack API Server
//!
//! Run with: cargo run --bin glycotrack-api
//!
//! # Configuration
//!
//! Settings come from the first config file found (see
//! `glycotrack-cli config --paths`), or from `GLYCOTRACK_CONFIG` when set,
//! then `GLYCOTRACK_*` environment overrides:
//! - `GLYCOTRACK_DB_PATH`: SQLite database file
//! - `GLYCOTRACK_API_HOST` / `GLYCOTRACK_API_PORT`: bind address (default 0.0.0.0:8000)
//! - `GLYCOTRACK_FORECASTER_URL`: forecasting model server (optional)
//! - `GLYCOTRACK_CLASSIFIER_URL`: cluster model server (optional, rules otherwise)
//! - `GLYCOTRACK_LLM_URL` / `GLYCOTRACK_LLM_MODEL`: chat runtime
//! - `RUST_LOG`: Log filter (default: glycotrack=info,tower_http=debug)

use anyhow::Context;
use glycotrack::api::{serve, ApiConfig, AppState};
use glycotrack::chat::{ChatService, OllamaChat, OllamaConfig, ReferenceGuide, SessionManager};
use glycotrack::config::{ChatConfig, Config, ModelsConfig};
use glycotrack::models::{
    Classifier, Forecaster, HttpClassifier, HttpForecaster, ModelClient, ModelClientConfig,
    RuleClassifier,
};
use glycotrack::scheduler::MetricsScheduler;
use glycotrack::store::SqliteStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Conversations untouched for this long are dropped
const CHAT_IDLE_SECS: u64 = 24 * 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("GLYCOTRACK_CONFIG") {
        Ok(path) => Config::load_with_env(Path::new(&path))?,
        Err(_) => Config::load_default(),
    };

    glycotrack::logging::init_tracing(&config.logging).context("failed to open log file")?;

    tracing::info!("Starting glycotrack API server v{}", env!("CARGO_PKG_VERSION"));

    // Initialize store
    let db_path = config.store.resolved_db_path();
    tracing::info!("Database: {:?}", db_path);
    let store = Arc::new(SqliteStore::open(&db_path)?);
    if config.store.seed_foods {
        store.seed_sample_foods()?;
    }

    // Models
    let classifier = build_classifier(&config.models)?;
    let forecaster = build_forecaster(&config.models).await?;

    let api_config = ApiConfig::new(config.api.host.clone(), config.api.port)
        .with_cors_origins(config.api.cors_origins.clone())
        .with_request_timeout(config.api.request_timeout_secs);
    let mut state = AppState::new(Arc::clone(&store), classifier, api_config.clone());

    if let Some(forecaster) = forecaster {
        state = state.with_forecaster(forecaster);
    }

    // Chat assistant
    if config.chat.enabled {
        let chat = build_chat(&config.chat).await?;
        spawn_session_eviction(Arc::clone(&chat));
        state = state.with_chat(chat);
    } else {
        tracing::info!("Chat assistant disabled");
    }

    // Daily metrics scheduler
    let scheduler = Arc::new(MetricsScheduler::new(
        Arc::clone(&store),
        config.scheduler.clone(),
    ));
    let scheduler_handle = Arc::clone(&scheduler).start();
    state = state.with_scheduler(Arc::clone(&scheduler));

    // Run server
    tracing::info!("Starting server on {}", api_config.addr());
    serve(state, &api_config).await?;

    // Graceful shutdown
    scheduler.stop().await;
    if let Some(handle) = scheduler_handle {
        handle.abort();
    }
    tracing::info!("glycotrack API server stopped");

    Ok(())
}

fn model_client(url: &str, timeout_ms: u64, max_retries: u32) -> anyhow::Result<ModelClient> {
    let client = ModelClient::new(ModelClientConfig {
        base_url: url.to_string(),
        request_timeout_ms: timeout_ms,
        max_retries,
        ..Default::default()
    })?;
    Ok(client)
}

fn build_classifier(models: &ModelsConfig) -> anyhow::Result<Arc<dyn Classifier>> {
    match &models.classifier_url {
        Some(url) => {
            tracing::info!("Cluster model: {}", url);
            let client = model_client(url, models.request_timeout_ms, models.max_retries)?;
            Ok(Arc::new(HttpClassifier::new(client)))
        }
        None => {
            tracing::info!("No classifier_url set, using rule-based clustering");
            Ok(Arc::new(RuleClassifier))
        }
    }
}

async fn build_forecaster(models: &ModelsConfig) -> anyhow::Result<Option<Arc<dyn Forecaster>>> {
    let Some(url) = &models.forecaster_url else {
        tracing::warn!("No forecaster_url set, forecasts will return 503");
        return Ok(None);
    };

    let client = model_client(url, models.request_timeout_ms, models.max_retries)?;
    let forecaster = HttpForecaster::new(client);

    match forecaster.health_check().await {
        Ok(()) => tracing::info!("Forecaster connection verified: {}", url),
        Err(e) => tracing::warn!("Forecaster not available: {} (forecasts will fail until it is)", e),
    }

    Ok(Some(Arc::new(forecaster)))
}

async fn build_chat(chat: &ChatConfig) -> anyhow::Result<Arc<ChatService>> {
    let guide = match &chat.guide_path {
        Some(path) => match ReferenceGuide::load(Path::new(path)) {
            Ok(guide) => Some(guide),
            Err(e) => {
                tracing::warn!("Reference guide {} not loaded: {}", path, e);
                None
            }
        },
        None => None,
    };

    let client = model_client(&chat.llm_url, chat.request_timeout_ms, 1)?;
    let model = OllamaChat::new(
        client,
        OllamaConfig {
            model: chat.model.clone(),
            temperature: chat.temperature,
        },
    );

    let service = ChatService::new(
        Arc::new(model),
        SessionManager::new(chat.history_exchanges),
        guide,
    );

    let health = service.health().await;
    tracing::info!(
        model = %health.model,
        status = health.status,
        guide_chunks = health.guide_chunks,
        "Chat assistant ready"
    );

    Ok(Arc::new(service))
}

fn spawn_session_eviction(chat: Arc<ChatService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let evicted = chat
                .sessions()
                .evict_idle(Duration::from_secs(CHAT_IDLE_SECS))
                .await;
            if evicted > 0 {
                tracing::info!(evicted = evicted, "Idle conversations evicted");
            }
        }
    });
}

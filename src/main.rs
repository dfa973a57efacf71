//! Transcript Insights — Binary Entrypoint
//! Boots the scheduler that drives the enrichment pipeline and the Axum
//! ops/read API (health, manual trigger, sentiment stats, Prometheus).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transcript_insights::api::{self, AppState};
use transcript_insights::config::{provider::ProviderConfig, PipelineConfig};
use transcript_insights::cursor::CursorStore;
use transcript_insights::metrics::Metrics;
use transcript_insights::notify::NotifierMux;
use transcript_insights::provider::build_provider_from_config;
use transcript_insights::runner::BatchRunner;
use transcript_insights::scheduler::spawn_scheduler;
use transcript_insights::sink::JsonlEnrichedStore;
use transcript_insights::source::JsonlInteractionLog;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("transcript_insights=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let pipeline_cfg = PipelineConfig::load_default().context("pipeline config")?;
    let provider_cfg = ProviderConfig::load_default().context("provider config")?;
    let provider = build_provider_from_config(&provider_cfg)?;
    tracing::info!(
        provider = provider.provider_name(),
        interval_secs = pipeline_cfg.interval_secs,
        batch_size_limit = pipeline_cfg.batch_size_limit,
        "pipeline configured"
    );

    let metrics = Metrics::init();

    let source = Arc::new(JsonlInteractionLog::new(env_path(
        "INTERACTIONS_PATH",
        "data/interactions.jsonl",
    )));
    let sink = Arc::new(JsonlEnrichedStore::new(env_path(
        "ENRICHED_PATH",
        "data/enriched.jsonl",
    )));
    let cursor = CursorStore::new(env_path("CURSOR_PATH", "state/cursor.json"));
    let notifier = Arc::new(NotifierMux::from_env());
    if notifier.is_empty() {
        tracing::info!("no notification channels configured");
    }

    let interval_secs = pipeline_cfg.interval_secs;
    let runner = Arc::new(BatchRunner::new(
        source,
        sink.clone(),
        cursor,
        provider,
        notifier,
        pipeline_cfg,
    ));
    spawn_scheduler(runner.clone(), interval_secs);

    let state = AppState {
        runner,
        sink,
        taxonomy_path: None,
    };
    let app = api::create_router(state).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "serving ops API");
    axum::serve(listener, app).await.context("serve")?;

    Ok(())
}

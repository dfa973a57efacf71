//! Ops/read API. The pipeline itself is driven by the scheduler; this
//! surface exists for operators (health, manual trigger) and dashboard
//! consumers (taxonomy view, sentiment aggregations).

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::runner::{BatchRunner, RunOutcome};
use crate::sink::{
    average_sentiment_by_subtopic, average_sentiment_by_topic, EnrichedSink, StatsFilter,
    SubtopicSentiment, TopicSentiment,
};
use crate::taxonomy::{self, TaxonomyEntry};

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<BatchRunner>,
    pub sink: Arc<dyn EnrichedSink>,
    pub taxonomy_path: Option<PathBuf>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/run", post(run_now))
        .route("/taxonomy", get(taxonomy_view))
        .route("/stats/topics", get(stats_topics))
        .route("/stats/subtopics", get(stats_subtopics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct RunResp {
    /// "success" | "no-new-data" | "error"
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<crate::runner::BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn run_now(State(state): State<AppState>) -> Json<RunResp> {
    let outcome = state.runner.run_once().await;
    let status = outcome.status();
    let resp = match outcome {
        RunOutcome::Completed(report) => RunResp {
            status,
            report: Some(report),
            error: None,
        },
        RunOutcome::NoNewData => RunResp {
            status,
            report: None,
            error: None,
        },
        RunOutcome::Failed(failure) => RunResp {
            status,
            report: None,
            error: Some(failure.cause),
        },
    };
    Json(resp)
}

#[derive(serde::Serialize)]
struct TaxonomyResp {
    entries: Vec<TaxonomyEntry>,
}

async fn taxonomy_view(State(state): State<AppState>) -> Json<TaxonomyResp> {
    let snapshot = match &state.taxonomy_path {
        Some(p) => taxonomy::load_from(p),
        None => taxonomy::load_default(),
    };
    let entries = match snapshot {
        Ok(s) => s.entries().to_vec(),
        Err(e) => {
            tracing::warn!("taxonomy view failed: {e:#}");
            Vec::new()
        }
    };
    Json(TaxonomyResp { entries })
}

async fn stats_topics(
    State(state): State<AppState>,
    Query(filter): Query<StatsFilter>,
) -> Json<Vec<TopicSentiment>> {
    let rows = match state.sink.load_all().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("stats read failed: {e:#}");
            Vec::new()
        }
    };
    Json(average_sentiment_by_topic(&rows, &filter))
}

async fn stats_subtopics(
    State(state): State<AppState>,
    Query(filter): Query<StatsFilter>,
) -> Json<Vec<SubtopicSentiment>> {
    let rows = match state.sink.load_all().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("stats read failed: {e:#}");
            Vec::new()
        }
    };
    Json(average_sentiment_by_subtopic(&rows, &filter))
}

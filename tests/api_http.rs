// tests/api_http.rs
//
// HTTP-level tests for the ops/read API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::body::Body;
use http::{Request, StatusCode};
use tower::ServiceExt;

use transcript_insights::api::{create_router, AppState};
use transcript_insights::config::PipelineConfig;
use transcript_insights::cursor::CursorStore;
use transcript_insights::notify::NotifierMux;
use transcript_insights::provider::mock::MockProvider;
use transcript_insights::runner::BatchRunner;
use transcript_insights::sink::JsonlEnrichedStore;
use transcript_insights::source::JsonlInteractionLog;

struct Harness {
    _dir: tempfile::TempDir,
    state: AppState,
}

fn harness(transcripts: &[&str]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let taxonomy_path = dir.path().join("taxonomy.toml");
    std::fs::write(
        &taxonomy_path,
        "[[entries]]\ntopic = \"Delivery issues\"\nsubtopic = \"N/A\"\n\n\
         [[entries]]\ntopic = \"Billing\"\nsubtopic = \"Refunds\"\n",
    )
    .unwrap();

    let log_path = dir.path().join("interactions.jsonl");
    let mut out = String::new();
    for t in transcripts {
        out.push_str(&serde_json::json!({ "transcript": t }).to_string());
        out.push('\n');
    }
    std::fs::write(&log_path, out).unwrap();

    let sink = Arc::new(JsonlEnrichedStore::new(dir.path().join("enriched.jsonl")));
    let runner = Arc::new(
        BatchRunner::new(
            Arc::new(JsonlInteractionLog::new(&log_path)),
            sink.clone(),
            CursorStore::new(dir.path().join("cursor.json")),
            Arc::new(MockProvider::new()),
            Arc::new(NotifierMux::disabled()),
            PipelineConfig::default(),
        )
        .with_taxonomy_path(&taxonomy_path),
    );

    Harness {
        state: AppState {
            runner,
            sink,
            taxonomy_path: Some(taxonomy_path),
        },
        _dir: dir,
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness(&[]);
    let resp = create_router(h.state).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn run_reports_success_then_no_new_data() {
    let h = harness(&["Customer: My parcel is late.\nAgent: Sorry."]);
    let app = create_router(h.state);

    let resp = app.clone().oneshot(post("/run")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["report"]["enriched"], 1);

    let resp = app.oneshot(post("/run")).await.unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["status"], "no-new-data");
    assert!(v.get("report").is_none());
}

#[tokio::test]
async fn taxonomy_view_lists_entries() {
    let h = harness(&[]);
    let resp = create_router(h.state)
        .oneshot(get("/taxonomy"))
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["entries"].as_array().unwrap().len(), 2);
    assert_eq!(v["entries"][0]["topic"], "Delivery issues");
}

#[tokio::test]
async fn stats_aggregate_after_a_run() {
    let h = harness(&[
        "Customer: My parcel is late.\nAgent: Sorry about that.",
        "Customer: Bonjour, mon colis est perdu.\nAgent: Desole.",
    ]);
    let app = create_router(h.state);

    let resp = app.clone().oneshot(post("/run")).await.unwrap();
    assert_eq!(body_json(resp).await["status"], "success");

    let resp = app.clone().oneshot(get("/stats/topics")).await.unwrap();
    let v = body_json(resp).await;
    let topics = v.as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["topic"], "Delivery issues");
    assert_eq!(topics[0]["count"], 2);

    // Language filter narrows the aggregate.
    let resp = app
        .clone()
        .oneshot(get("/stats/topics?language=fr"))
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v.as_array().unwrap()[0]["count"], 1);

    let resp = app.oneshot(get("/stats/subtopics")).await.unwrap();
    let v = body_json(resp).await;
    assert_eq!(v.as_array().unwrap()[0]["subtopic"], "N/A");
}

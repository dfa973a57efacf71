// tests/scheduler_ticks.rs
//! The scheduler drives batches on its interval and is a no-op when no new
//! data exists. Uses a 1s interval and real time; generous waits keep it
//! stable on slow CI.

use std::sync::Arc;
use std::time::Duration;

use transcript_insights::config::PipelineConfig;
use transcript_insights::cursor::CursorStore;
use transcript_insights::notify::NotifierMux;
use transcript_insights::provider::mock::MockProvider;
use transcript_insights::runner::BatchRunner;
use transcript_insights::scheduler::spawn_scheduler;
use transcript_insights::sink::{EnrichedSink, JsonlEnrichedStore};
use transcript_insights::source::JsonlInteractionLog;

#[tokio::test]
async fn scheduler_picks_up_new_records_and_idles_without_them() {
    let dir = tempfile::tempdir().unwrap();
    let taxonomy_path = dir.path().join("taxonomy.toml");
    std::fs::write(
        &taxonomy_path,
        "[[entries]]\ntopic = \"Delivery issues\"\nsubtopic = \"N/A\"\n",
    )
    .unwrap();
    let log_path = dir.path().join("interactions.jsonl");
    let sink_path = dir.path().join("enriched.jsonl");
    let cursor_path = dir.path().join("cursor.json");

    let runner = Arc::new(
        BatchRunner::new(
            Arc::new(JsonlInteractionLog::new(&log_path)),
            Arc::new(JsonlEnrichedStore::new(&sink_path)),
            CursorStore::new(&cursor_path),
            Arc::new(MockProvider::new()),
            Arc::new(NotifierMux::disabled()),
            PipelineConfig::default(),
        )
        .with_taxonomy_path(&taxonomy_path),
    );

    let handle = spawn_scheduler(runner, 1);

    // First ticks see an empty log: cursor stays at zero, sink stays empty.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!sink_path.exists());
    assert_eq!(CursorStore::new(&cursor_path).load().unwrap().last_seq, 0);

    // New record arrives; a later tick consumes it.
    std::fs::write(
        &log_path,
        format!(
            "{}\n",
            serde_json::json!({ "transcript": "Customer: My parcel is late.\nAgent: Sorry." })
        ),
    )
    .unwrap();

    let mut consumed = false;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if CursorStore::new(&cursor_path).load().unwrap().last_seq == 1 {
            consumed = true;
            break;
        }
    }
    assert!(consumed, "scheduler never consumed the new record");

    let rows = JsonlEnrichedStore::new(&sink_path).load_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].primary_topic, "Delivery issues");

    handle.abort();
}

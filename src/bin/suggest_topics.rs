//! Offline taxonomy bootstrapping CLI. Samples translated transcripts from
//! the enriched store and prints candidate topic labels for human review.
//! Run several times, compare, then curate config/taxonomy.toml by hand.
//!
//! Usage: suggest-topics [sample_size] [label_count]
//! Env:   ENRICHED_PATH (default data/enriched.jsonl), PIPELINE_TEST_MODE=mock

use anyhow::{Context, Result};

use transcript_insights::bootstrap::suggest_topics;
use transcript_insights::config::provider::ProviderConfig;
use transcript_insights::provider::build_provider_from_config;
use transcript_insights::sink::{EnrichedSink, JsonlEnrichedStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let sample_size: usize = args
        .next()
        .map(|v| v.parse().context("sample_size must be a number"))
        .transpose()?
        .unwrap_or(25);
    let label_count: usize = args
        .next()
        .map(|v| v.parse().context("label_count must be a number"))
        .transpose()?
        .unwrap_or(10);

    let provider_cfg = ProviderConfig::load_default().context("provider config")?;
    let provider = build_provider_from_config(&provider_cfg)?;

    let path = std::env::var("ENRICHED_PATH").unwrap_or_else(|_| "data/enriched.jsonl".to_string());
    let store = JsonlEnrichedStore::new(&path);
    let transcripts: Vec<String> = store
        .load_all()
        .await
        .with_context(|| format!("loading enriched store {path}"))?
        .into_iter()
        .map(|row| row.translated_transcript)
        .collect();

    let labels = suggest_topics(provider.as_ref(), &transcripts, sample_size, label_count).await?;

    println!("Candidate topics ({} of {} transcripts sampled):", sample_size.min(transcripts.len()), transcripts.len());
    for label in labels {
        println!("  - {label}");
    }
    println!("Review and curate config/taxonomy.toml manually.");
    Ok(())
}

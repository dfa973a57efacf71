//! Offline taxonomy bootstrapping. Samples translated transcripts, asks the
//! provider's generative summarizer for candidate topic labels, and returns
//! them for human review. Advisory only: nothing here touches the runtime
//! pipeline or the taxonomy files.

use anyhow::{ensure, Context, Result};
use rand::seq::IndexedRandom;

use crate::provider::LanguageProvider;

const MAX_LABEL_WORDS: usize = 5;

/// Ask for exactly `label_count` candidate labels from a random sample of
/// `sample_size` transcripts. Errors if the provider cannot produce enough
/// distinct usable labels.
pub async fn suggest_topics(
    provider: &dyn LanguageProvider,
    transcripts: &[String],
    sample_size: usize,
    label_count: usize,
) -> Result<Vec<String>> {
    ensure!(label_count > 0, "label_count must be at least 1");
    ensure!(!transcripts.is_empty(), "no transcripts to sample from");

    let mut rng = rand::rng();
    let sample: Vec<&String> = transcripts
        .choose_multiple(&mut rng, sample_size.min(transcripts.len()))
        .collect();

    let instruction = format!(
        "You will receive customer-interaction transcripts separated by \"---\". \
         Identify the {label_count} most common complaint or request topics. \
         Reply with exactly {label_count} short labels of at most {MAX_LABEL_WORDS} words each, \
         one per line, no numbering, no preamble."
    );
    let joined = sample
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");

    let reply = provider
        .summarize(&instruction, &joined)
        .await
        .context("topic suggestion call")?;

    let labels = parse_labels(&reply, label_count);
    ensure!(
        labels.len() >= label_count,
        "provider returned {} usable labels, wanted {label_count}: {reply:?}",
        labels.len()
    );
    Ok(labels.into_iter().take(label_count).collect())
}

/// Clean up one reply into candidate labels: strip bullets/numbering, cap
/// word count, drop blanks and duplicates (case-insensitive).
fn parse_labels(reply: &str, want: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(want);
    for line in reply.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')'))
            .trim()
            .to_string();
        if cleaned.is_empty() {
            continue;
        }
        let capped = cleaned
            .split_whitespace()
            .take(MAX_LABEL_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        if !out.iter().any(|l| l.eq_ignore_ascii_case(&capped)) {
            out.push(capped);
        }
    }
    out
}

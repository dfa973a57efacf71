//! Enriched-interaction sink: append-only store with atomic batch writes and
//! per-source-record idempotence, plus the derived sentiment aggregations
//! dashboard consumers read.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::write_atomic;
use crate::interaction::EnrichedInteraction;

#[async_trait]
pub trait EnrichedSink: Send + Sync {
    /// Append a whole batch atomically. Rows whose `source_seq` is already
    /// present are skipped, so replaying a batch after a crash-before-
    /// cursor-advance cannot create duplicates. Returns the number of rows
    /// actually written.
    async fn append_batch(&self, rows: &[EnrichedInteraction]) -> Result<usize>;

    async fn load_all(&self) -> Result<Vec<EnrichedInteraction>>;

    fn name(&self) -> &'static str;
}

/// JSONL-backed sink. A batch append rewrites the file through a temp file +
/// rename, so downstream readers never observe a partial batch.
pub struct JsonlEnrichedStore {
    path: PathBuf,
}

impl JsonlEnrichedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_rows(&self) -> Result<Vec<EnrichedInteraction>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading enriched store {}", self.path.display()))?;
        let mut rows = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row: EnrichedInteraction = serde_json::from_str(line)
                .with_context(|| format!("parse enriched store line {}", idx + 1))?;
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl EnrichedSink for JsonlEnrichedStore {
    async fn append_batch(&self, rows: &[EnrichedInteraction]) -> Result<usize> {
        let existing = self.read_rows()?;
        let seen: HashSet<u64> = existing.iter().map(|r| r.source_seq).collect();
        let fresh: Vec<&EnrichedInteraction> =
            rows.iter().filter(|r| !seen.contains(&r.source_seq)).collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut out = String::new();
        for row in existing.iter() {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        for row in &fresh {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating sink dir {}", dir.display()))?;
        }
        write_atomic(&self.path, out.as_bytes())
            .with_context(|| format!("writing enriched store {}", self.path.display()))?;
        Ok(fresh.len())
    }

    async fn load_all(&self) -> Result<Vec<EnrichedInteraction>> {
        self.read_rows()
    }

    fn name(&self) -> &'static str {
        "jsonl-store"
    }
}

// ---- derived read queries ------------------------------------------------

/// Filters shared by the aggregation queries; all optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsFilter {
    /// Match on `original_language` (case-insensitive).
    pub language: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl StatsFilter {
    fn keep(&self, row: &EnrichedInteraction) -> bool {
        if let Some(lang) = &self.language {
            if !row.original_language.eq_ignore_ascii_case(lang) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if row.processed_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if row.processed_at > until {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSentiment {
    pub topic: String,
    pub average_sentiment: f32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtopicSentiment {
    pub topic: String,
    pub subtopic: String,
    pub average_sentiment: f32,
    pub count: usize,
}

/// Average sentiment grouped by primary topic, first-seen topic order.
pub fn average_sentiment_by_topic(
    rows: &[EnrichedInteraction],
    filter: &StatsFilter,
) -> Vec<TopicSentiment> {
    let mut out: Vec<TopicSentiment> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    for row in rows.iter().filter(|r| filter.keep(r)) {
        match out
            .iter()
            .position(|t| t.topic.eq_ignore_ascii_case(&row.primary_topic))
        {
            Some(i) => {
                sums[i] += f64::from(row.sentiment);
                out[i].count += 1;
            }
            None => {
                out.push(TopicSentiment {
                    topic: row.primary_topic.clone(),
                    average_sentiment: 0.0,
                    count: 1,
                });
                sums.push(f64::from(row.sentiment));
            }
        }
    }
    for (t, sum) in out.iter_mut().zip(sums) {
        t.average_sentiment = (sum / t.count as f64) as f32;
    }
    out
}

/// Average sentiment grouped by (primary, secondary), first-seen order.
pub fn average_sentiment_by_subtopic(
    rows: &[EnrichedInteraction],
    filter: &StatsFilter,
) -> Vec<SubtopicSentiment> {
    let mut out: Vec<SubtopicSentiment> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    for row in rows.iter().filter(|r| filter.keep(r)) {
        match out.iter().position(|t| {
            t.topic.eq_ignore_ascii_case(&row.primary_topic)
                && t.subtopic.eq_ignore_ascii_case(&row.secondary_topic)
        }) {
            Some(i) => {
                sums[i] += f64::from(row.sentiment);
                out[i].count += 1;
            }
            None => {
                out.push(SubtopicSentiment {
                    topic: row.primary_topic.clone(),
                    subtopic: row.secondary_topic.clone(),
                    average_sentiment: 0.0,
                    count: 1,
                });
                sums.push(f64::from(row.sentiment));
            }
        }
    }
    for (t, sum) in out.iter_mut().zip(sums) {
        t.average_sentiment = (sum / t.count as f64) as f32;
    }
    out
}

//! Append-only interaction log: the trait the change tracker consumes, plus
//! the shipped JSONL implementation and transcript normalization.
//!
//! Line order in the JSONL file is arrival order; `seq` is the 1-based line
//! number. The core assumes arrival order is monotonic and stable — that is
//! the input collaborator's contract.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::PathBuf;

use crate::interaction::RawInteraction;

#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Highest sequence number currently in the log (0 when empty).
    async fn latest_seq(&self) -> Result<u64>;

    /// Records with `seq > after`, in arrival order, at most `limit`.
    async fn fetch_after(&self, after: u64, limit: usize) -> Result<Vec<RawInteraction>>;

    fn name(&self) -> &'static str;
}

/// Normalize a transcript: decode HTML entities, strip tags, normalize curly
/// quotes, collapse intra-line whitespace and cap length. Line boundaries are
/// preserved — they carry the speaker-turn structure the classifier and the
/// translator depend on.
pub fn normalize_transcript(s: &str) -> String {
    // 1) HTML entity decode
    let decoded = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let decoded = re_tags.replace_all(&decoded, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    let decoded = decoded
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse spaces/tabs per line, keep the line structure
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[ \t]+").unwrap());
    let mut out = decoded
        .lines()
        .map(|line| re_ws.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    // 5) Length cap: 8000 chars (provider context guard)
    if out.chars().count() > 8000 {
        out = out.chars().take(8000).collect();
    }

    out
}

/// JSONL-backed append-only log. One JSON `RawInteraction` per line; `seq`
/// is overwritten with the line number on read so a producer cannot break
/// cursor accounting by writing stale values.
pub struct JsonlInteractionLog {
    path: PathBuf,
}

impl JsonlInteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading interaction log {}", self.path.display()))?;
        Ok(content
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

#[async_trait]
impl InteractionSource for JsonlInteractionLog {
    async fn latest_seq(&self) -> Result<u64> {
        Ok(self.read_lines()?.len() as u64)
    }

    async fn fetch_after(&self, after: u64, limit: usize) -> Result<Vec<RawInteraction>> {
        let lines = self.read_lines()?;
        let mut out = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let seq = (idx + 1) as u64;
            if seq <= after {
                continue;
            }
            if out.len() >= limit {
                break;
            }
            let mut row: RawInteraction = serde_json::from_str(line)
                .with_context(|| format!("parse interaction log line {seq}"))?;
            row.seq = seq;
            row.transcript = normalize_transcript(&row.transcript);
            out.push(row);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "jsonl-log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_turns_and_strips_html() {
        let s = "Customer:   Hello,&nbsp;my <b>screen</b> broke!\nAgent:\tSorry to hear that.";
        let out = normalize_transcript(s);
        assert_eq!(
            out,
            "Customer: Hello, my screen broke!\nAgent: Sorry to hear that."
        );
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn normalize_drops_blank_lines() {
        let out = normalize_transcript("Customer: Hi.\n\n\nAgent: Hello.");
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn jsonl_log_assigns_seq_from_line_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interactions.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"transcript":"Customer: First."}"#,
                "\n",
                r#"{"seq":99,"transcript":"Customer: Second."}"#,
                "\n",
                r#"{"transcript":"Customer: Third."}"#,
                "\n",
            ),
        )
        .unwrap();

        let log = JsonlInteractionLog::new(&path);
        assert_eq!(log.latest_seq().await.unwrap(), 3);

        let rows = log.fetch_after(1, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        // Producer-written seq is overridden by arrival order.
        assert_eq!(rows[0].seq, 2);
        assert_eq!(rows[1].seq, 3);

        let bounded = log.fetch_after(0, 2).await.unwrap();
        assert_eq!(bounded.len(), 2);
    }

    #[tokio::test]
    async fn missing_log_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlInteractionLog::new(dir.path().join("absent.jsonl"));
        assert_eq!(log.latest_seq().await.unwrap(), 0);
        assert!(log.fetch_after(0, 5).await.unwrap().is_empty());
    }
}

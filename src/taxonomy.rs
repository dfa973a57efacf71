//! Two-level topic taxonomy: a small (topic, subtopic) reference table loaded
//! from TOML or JSON and captured as an immutable snapshot once per batch.
//! Classification candidate sets are derived from the snapshot, so they stay
//! consistent for every record in a batch even if the file changes mid-run.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "TAXONOMY_PATH";

/// Subtopic sentinel: the primary topic matched but no finer-grained
/// subtopic applies.
pub const NO_SUBTOPIC: &str = "N/A";

/// Secondary sentinel used when the candidate subtopic set is empty, so the
/// classifier is never invoked with zero candidates.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Fuzzy-match floor for mapping a provider label onto a known row. Below
/// this the label is reported as unknown and the configured policy applies.
const FUZZY_MATCH_THRESHOLD: f64 = 0.92;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub topic: String,
    pub subtopic: String,
}

/// Result of resolving a provider-returned label against the snapshot.
/// `Known` carries the canonical spelling from the taxonomy; `Unknown`
/// carries the raw reply so callers can log it before applying policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelMatch {
    Known(String),
    Unknown(String),
}

/// Immutable view over the taxonomy, captured once per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomySnapshot {
    entries: Vec<TaxonomyEntry>,
}

impl TaxonomySnapshot {
    /// Build a snapshot from raw entries: trims, drops blank topics, coerces
    /// blank subtopics to "N/A" and deduplicates (topic, subtopic) pairs
    /// case-insensitively while preserving first-seen order and spelling.
    pub fn new(raw: Vec<TaxonomyEntry>) -> Result<Self> {
        let mut entries: Vec<TaxonomyEntry> = Vec::with_capacity(raw.len());
        for mut e in raw {
            e.topic = e.topic.trim().to_string();
            e.subtopic = e.subtopic.trim().to_string();
            if e.topic.is_empty() {
                continue;
            }
            if e.subtopic.is_empty() {
                e.subtopic = NO_SUBTOPIC.to_string();
            }
            let dup = entries.iter().any(|seen| {
                seen.topic.eq_ignore_ascii_case(&e.topic)
                    && seen.subtopic.eq_ignore_ascii_case(&e.subtopic)
            });
            if !dup {
                entries.push(e);
            }
        }
        if entries.is_empty() {
            bail!("taxonomy has no usable entries");
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    /// Distinct topics in first-seen order. Every topic here has at least one
    /// subtopic row by construction.
    pub fn topics(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.entries {
            if !out.iter().any(|t| t.eq_ignore_ascii_case(&e.topic)) {
                out.push(e.topic.clone());
            }
        }
        out
    }

    /// Subtopics filed under `topic` (case-insensitive), first-seen order.
    pub fn subtopics_for(&self, topic: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for e in &self.entries {
            if e.topic.eq_ignore_ascii_case(topic)
                && !out.iter().any(|s| s.eq_ignore_ascii_case(&e.subtopic))
            {
                out.push(e.subtopic.clone());
            }
        }
        out
    }

    /// Resolve a provider label against the distinct topic list.
    pub fn resolve_topic(&self, label: &str) -> LabelMatch {
        resolve_against(&self.topics(), label)
    }

    /// Resolve a provider label against the subtopics of `topic`.
    pub fn resolve_subtopic(&self, topic: &str, label: &str) -> LabelMatch {
        resolve_against(&self.subtopics_for(topic), label)
    }
}

/// Case-insensitive exact match first, then a high-confidence fuzzy match
/// (providers occasionally drop punctuation or pluralize). The canonical
/// spelling from the candidate list always wins.
fn resolve_against(candidates: &[String], label: &str) -> LabelMatch {
    let needle = label.trim();
    if needle.is_empty() {
        return LabelMatch::Unknown(label.to_string());
    }
    for c in candidates {
        if c.eq_ignore_ascii_case(needle) {
            return LabelMatch::Known(c.clone());
        }
    }
    let mut best: Option<(f64, &String)> = None;
    for c in candidates {
        let score = strsim::jaro_winkler(&c.to_lowercase(), &needle.to_lowercase());
        if best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, c));
        }
    }
    match best {
        Some((score, c)) if score >= FUZZY_MATCH_THRESHOLD => LabelMatch::Known(c.clone()),
        _ => LabelMatch::Unknown(needle.to_string()),
    }
}

// ---- loading -------------------------------------------------------------

#[derive(Deserialize)]
struct TomlTaxonomy {
    entries: Vec<TaxonomyEntry>,
}

/// Load from an explicit path. Supports TOML (`[[entries]]` tables) or a
/// JSON array of `{topic, subtopic}` objects.
pub fn load_from(path: &Path) -> Result<TaxonomySnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading taxonomy from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let entries: Vec<TaxonomyEntry> = if ext == "toml" {
        let t: TomlTaxonomy = toml::from_str(&content).context("parse taxonomy TOML")?;
        t.entries
    } else {
        serde_json::from_str(&content).context("parse taxonomy JSON")?
    };
    TaxonomySnapshot::new(entries)
}

/// Load using env var + fallbacks:
/// 1) $TAXONOMY_PATH
/// 2) config/taxonomy.toml
/// 3) config/taxonomy.json
pub fn load_default() -> Result<TaxonomySnapshot> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("TAXONOMY_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/taxonomy.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/taxonomy.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Err(anyhow!("no taxonomy file found (config/taxonomy.toml or config/taxonomy.json)"))
}

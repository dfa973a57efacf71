// src/config/mod.rs
//! Runtime configuration. The pipeline config lives in TOML or JSON under
//! `config/`, with an env-var path override, mirroring the provider config
//! in [`provider`].

pub mod provider;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "PIPELINE_CONFIG_PATH";

fn default_interval_secs() -> u64 {
    8 * 3600
}
fn default_batch_size_limit() -> usize {
    200
}
fn default_min_transcript_length() -> usize {
    5
}
fn default_max_concurrency() -> usize {
    4
}
fn default_fallback_topic() -> String {
    "Other".to_string()
}
fn default_target_language() -> String {
    "en".to_string()
}

/// How the input log behaves. Only append-only is supported; update-capable
/// sources need change semantics this pipeline does not implement, so the
/// setting is rejected at load rather than silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StreamMode {
    #[default]
    AppendOnly,
    AppendAndUpdate,
}

/// Policy for classifier labels that do not resolve to a known taxonomy row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLabelPolicy {
    /// Coerce to the fallback topic ("Other") / the "Unclassified" sentinel.
    #[default]
    Coerce,
    /// Drop the record from the batch output.
    Exclude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Scheduler period. Default 8 hours.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on raw records consumed per batch.
    #[serde(default = "default_batch_size_limit")]
    pub batch_size_limit: usize,
    /// Records with `transcript.chars().count() <= min_transcript_length`
    /// are dropped before any provider call.
    #[serde(default = "default_min_transcript_length")]
    pub min_transcript_length: usize,
    #[serde(default)]
    pub stream_mode: StreamMode,
    /// Concurrent in-flight records per batch (provider rate-limit guard).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub unknown_label_policy: UnknownLabelPolicy,
    #[serde(default = "default_fallback_topic")]
    pub fallback_topic: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size_limit: default_batch_size_limit(),
            min_transcript_length: default_min_transcript_length(),
            stream_mode: StreamMode::default(),
            max_concurrency: default_max_concurrency(),
            unknown_label_policy: UnknownLabelPolicy::default(),
            fallback_topic: default_fallback_topic(),
            target_language: default_target_language(),
        }
    }
}

impl PipelineConfig {
    /// Load from an explicit path. Format is picked by extension, with a
    /// JSON fallback for unknown extensions.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: PipelineConfig = if ext == "toml" {
            toml::from_str(&content).context("parse pipeline config TOML")?
        } else {
            serde_json::from_str(&content).context("parse pipeline config JSON")?
        };
        cfg.validate()
    }

    /// Load using env var + fallbacks:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) config/pipeline.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            bail!("PIPELINE_CONFIG_PATH points to non-existent path");
        }
        let toml_p = PathBuf::from("config/pipeline.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/pipeline.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        PipelineConfig::default().validate()
    }

    fn validate(mut self) -> Result<Self> {
        if self.stream_mode == StreamMode::AppendAndUpdate {
            bail!("stream_mode \"append-and-update\" is not supported; the input log must be append-only");
        }
        if self.batch_size_limit == 0 {
            bail!("batch_size_limit must be at least 1");
        }
        if self.max_concurrency == 0 {
            self.max_concurrency = 1;
        }
        self.fallback_topic = self.fallback_topic.trim().to_string();
        if self.fallback_topic.is_empty() {
            self.fallback_topic = default_fallback_topic();
        }
        self.target_language = self.target_language.trim().to_ascii_lowercase();
        if self.target_language.is_empty() {
            self.target_language = default_target_language();
        }
        Ok(self)
    }
}

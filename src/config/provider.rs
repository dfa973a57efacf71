// src/config/provider.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

const ENV_PATH: &str = "PROVIDER_CONFIG_PATH";

fn default_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_max_retries() -> u32 {
    2
}

/// Which remote capability provider backs the four language operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// "openai" (case-insensitive). Other providers can be added behind the
    /// same trait.
    pub provider: String,
    /// Optional model override, e.g. "gpt-4o-mini".
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from OPENAI_API_KEY (by provider).
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra attempts after the first call, transient failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl ProviderConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(&path).with_context(|| {
            format!("reading provider config from {}", path.as_ref().display())
        })?;
        let mut cfg: ProviderConfig =
            serde_json::from_str(&data).context("parse provider config JSON")?;

        // Normalize provider
        cfg.provider = cfg.provider.to_lowercase();

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => bail!("Unsupported provider in config: {other}"),
            };
        }

        if cfg.timeout_secs == 0 {
            cfg.timeout_secs = default_timeout_secs();
        }
        if cfg.connect_timeout_secs == 0 {
            cfg.connect_timeout_secs = default_connect_timeout_secs();
        }

        Ok(cfg)
    }

    /// Load using env var + fallback to `config/provider.json`.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PATH) {
            return Self::load_from_file(PathBuf::from(p));
        }
        Self::load_from_file("config/provider.json")
    }
}

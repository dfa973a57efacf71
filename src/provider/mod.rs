//! Provider abstraction over the remote language-understanding service.
//! One trait covers the four runtime operations (detect, translate,
//! sentiment, classify) plus the offline summarizer used by the taxonomy
//! bootstrapper. Concrete providers do real remote calls; wrappers add
//! bounded retry on transient failures.

pub mod mock;
pub mod openai;
pub mod retry;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::provider::ProviderConfig;

/// Remote capability interface. Any compliant provider (local model server,
/// third-party API) may be substituted behind this trait.
#[async_trait]
pub trait LanguageProvider: Send + Sync {
    /// Return a short language code (ISO 639-1-ish) for the text.
    async fn detect_language(&self, text: &str) -> Result<String>;

    /// Translate to `target_lang`, preserving speaker labels and turn
    /// boundaries.
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;

    /// Bounded sentiment score in [-1.0, 1.0].
    async fn score_sentiment(&self, text: &str) -> Result<f32>;

    /// Pick exactly one label out of `candidates`.
    async fn classify(
        &self,
        text: &str,
        candidates: &[String],
        task_hint: Option<&str>,
    ) -> Result<String>;

    /// Free-form generative call. Only the offline taxonomy bootstrapper
    /// uses this; the runtime pipeline never does.
    async fn summarize(&self, instruction: &str, text: &str) -> Result<String>;

    /// Provider name for diagnostics/headers.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynProvider = Arc<dyn LanguageProvider>;

/// Factory: build a provider according to config and environment variables.
///
/// * If `PIPELINE_TEST_MODE=mock`, returns a deterministic mock provider.
/// * Else builds the real provider wrapped with bounded retry.
pub fn build_provider_from_config(config: &ProviderConfig) -> Result<DynProvider> {
    if std::env::var("PIPELINE_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(mock::MockProvider::default()));
    }

    match config.provider.as_str() {
        "openai" => {
            let inner = openai::OpenAiProvider::new(config);
            Ok(Arc::new(retry::RetryingProvider::new(
                inner,
                config.max_retries,
            )))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}

/// Marker error for failures a wrapper may retry. Providers that cannot
/// surface a `reqwest::Error` (mocks, local stubs) wrap transient conditions
/// in this type instead.
#[derive(Debug)]
pub struct TransientError(pub String);

impl fmt::Display for TransientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transient provider failure: {}", self.0)
    }
}

impl std::error::Error for TransientError {}

/// Classify a provider error as retryable. Network timeouts, connect
/// failures and 429/5xx statuses qualify; everything else is permanent.
pub fn is_transient(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<TransientError>().is_some() {
        return true;
    }
    for cause in err.chain() {
        if let Some(re) = cause.downcast_ref::<reqwest::Error>() {
            if re.is_timeout() || re.is_connect() {
                return true;
            }
            if let Some(status) = re.status() {
                if status.is_server_error() || status.as_u16() == 429 {
                    return true;
                }
            }
        }
    }
    false
}

/// Ensure a provider-returned label is a single trimmed line with collapsed
/// whitespace, capped at 120 chars. Models occasionally decorate answers;
/// downstream matching expects a bare label.
pub fn sanitize_label(input: &str) -> String {
    let mut out = String::with_capacity(120);
    let mut prev_space = false;
    for ch in input.chars() {
        let c = match ch {
            '\r' | '\n' | '\t' => ' ',
            c => c,
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.chars().count() >= 120 {
            break;
        }
    }
    out.trim().trim_matches('"').trim().to_string()
}

/// Parse a sentiment reply. Accepts a bare number or a number embedded in a
/// short sentence; clamps into [-1.0, 1.0].
pub fn parse_sentiment_reply(raw: &str) -> Result<f32> {
    let cleaned = raw.trim();
    if let Ok(v) = cleaned.parse::<f32>() {
        return Ok(v.clamp(-1.0, 1.0));
    }
    // Fall back to the first numeric token in the reply.
    for tok in cleaned.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        let tok = tok.trim_matches(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.' || c == '+'));
        if tok.is_empty() {
            continue;
        }
        if let Ok(v) = tok.parse::<f32>() {
            return Ok(v.clamp(-1.0, 1.0));
        }
    }
    anyhow::bail!("sentiment reply contained no number: {cleaned:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_label_strips_decorations() {
        assert_eq!(sanitize_label("  \"Delivery issues\"\n"), "Delivery issues");
        assert_eq!(sanitize_label("Billing\t and  payments"), "Billing and payments");
    }

    #[test]
    fn parse_sentiment_accepts_bare_and_embedded_numbers() {
        assert_eq!(parse_sentiment_reply("-0.4").unwrap(), -0.4);
        assert_eq!(parse_sentiment_reply("Score: 0.85").unwrap(), 0.85);
        assert_eq!(parse_sentiment_reply("2.5").unwrap(), 1.0); // clamped
        assert!(parse_sentiment_reply("very positive").is_err());
    }

    #[test]
    fn transient_marker_is_retryable() {
        let err = anyhow::Error::new(TransientError("503".into()));
        assert!(is_transient(&err));
        let err = anyhow::anyhow!("bad label");
        assert!(!is_transient(&err));
    }
}

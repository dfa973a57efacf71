//! Deterministic mock provider for tests and local runs
//! (`PIPELINE_TEST_MODE=mock`). No network, no randomness; call counts are
//! recorded so tests can assert which stages actually hit the provider.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{LanguageProvider, TransientError};

#[derive(Default)]
struct Inner {
    calls: HashMap<String, u32>,
    scripted_classify: VecDeque<String>,
    scripted_summary: Option<String>,
    fail_remote: bool,
}

#[derive(Default)]
pub struct MockProvider {
    inner: Mutex<Inner>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider where every remote call errors — simulates a full outage.
    pub fn failing() -> Self {
        let mock = Self::default();
        mock.inner.lock().expect("mock mutex poisoned").fail_remote = true;
        mock
    }

    /// Queue a classification reply; consumed in FIFO order before the
    /// default first-candidate behavior.
    pub fn push_classify_reply(&self, label: impl Into<String>) {
        self.inner
            .lock()
            .expect("mock mutex poisoned")
            .scripted_classify
            .push_back(label.into());
    }

    pub fn set_summary_reply(&self, reply: impl Into<String>) {
        self.inner.lock().expect("mock mutex poisoned").scripted_summary = Some(reply.into());
    }

    /// Number of calls made to the named operation so far.
    pub fn calls(&self, op: &str) -> u32 {
        *self
            .inner
            .lock()
            .expect("mock mutex poisoned")
            .calls
            .get(op)
            .unwrap_or(&0)
    }

    fn bump(&self, op: &str) -> Result<()> {
        let mut g = self.inner.lock().expect("mock mutex poisoned");
        *g.calls.entry(op.to_string()).or_insert(0) += 1;
        if g.fail_remote {
            anyhow::bail!(TransientError(format!("{op} unavailable (mock outage)")));
        }
        Ok(())
    }
}

/// Tiny greeting lexicon; enough for deterministic detection in tests.
fn guess_language(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    const MARKERS: &[(&str, &str)] = &[
        ("bonjour", "fr"),
        ("merci", "fr"),
        ("hola", "es"),
        ("gracias", "es"),
        ("hallo", "de"),
        ("danke", "de"),
        ("ciao", "it"),
    ];
    for (marker, code) in MARKERS {
        if lower.contains(marker) {
            return code;
        }
    }
    "en"
}

#[async_trait]
impl LanguageProvider for MockProvider {
    async fn detect_language(&self, text: &str) -> Result<String> {
        self.bump("detect_language")?;
        Ok(guess_language(text).to_string())
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        self.bump("translate")?;
        // Keep speaker labels and one-line-per-turn structure intact.
        let translated = text
            .lines()
            .map(|line| match line.split_once(':') {
                Some((label, rest)) => format!("{label}: [{target_lang}]{rest}"),
                None => format!("[{target_lang}] {line}"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(translated)
    }

    async fn score_sentiment(&self, text: &str) -> Result<f32> {
        self.bump("score_sentiment")?;
        let lower = text.to_lowercase();
        const POSITIVE: &[&str] = &["thank", "great", "happy", "resolved", "perfect"];
        const NEGATIVE: &[&str] = &["angry", "broken", "refund", "late", "complaint"];
        let pos = POSITIVE.iter().filter(|w| lower.contains(**w)).count() as f32;
        let neg = NEGATIVE.iter().filter(|w| lower.contains(**w)).count() as f32;
        Ok(((pos - neg) * 0.4).clamp(-1.0, 1.0))
    }

    async fn classify(
        &self,
        _text: &str,
        candidates: &[String],
        _task_hint: Option<&str>,
    ) -> Result<String> {
        self.bump("classify")?;
        let scripted = self
            .inner
            .lock()
            .expect("mock mutex poisoned")
            .scripted_classify
            .pop_front();
        if let Some(label) = scripted {
            return Ok(label);
        }
        candidates
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("classify called with no candidates"))
    }

    async fn summarize(&self, _instruction: &str, _text: &str) -> Result<String> {
        self.bump("summarize")?;
        let scripted = self
            .inner
            .lock()
            .expect("mock mutex poisoned")
            .scripted_summary
            .clone();
        Ok(scripted.unwrap_or_else(|| "General feedback".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detection_is_deterministic_and_counted() {
        let mock = MockProvider::new();
        assert_eq!(mock.detect_language("Bonjour!").await.unwrap(), "fr");
        assert_eq!(mock.detect_language("Hello there").await.unwrap(), "en");
        assert_eq!(mock.calls("detect_language"), 2);
    }

    #[tokio::test]
    async fn translate_preserves_turn_structure() {
        let mock = MockProvider::new();
        let out = mock
            .translate("Customer: Bonjour.\nAgent: Bonjour, comment puis-je vous aider?", "en")
            .await
            .unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().next().unwrap().starts_with("Customer:"));
    }

    #[tokio::test]
    async fn failing_mock_errors_transiently() {
        let mock = MockProvider::failing();
        let err = mock.detect_language("hi").await.unwrap_err();
        assert!(super::super::is_transient(&err));
    }
}

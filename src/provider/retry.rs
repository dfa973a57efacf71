//! Bounded retry over any [`LanguageProvider`]. Retries apply to one remote
//! call at a time, so a retried stage never re-submits another stage of the
//! same record.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::{is_transient, LanguageProvider};

const BACKOFF_BASE_MS: u64 = 250;

pub struct RetryingProvider<P> {
    inner: P,
    max_retries: u32,
}

impl<P: LanguageProvider> RetryingProvider<P> {
    pub fn new(inner: P, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }

    async fn with_retry<'a, T, F, Fut>(&'a self, op: F) -> Result<T>
    where
        F: Fn(&'a P) -> Fut,
        Fut: std::future::Future<Output = Result<T>> + 'a,
    {
        let mut attempt: u32 = 0;
        loop {
            match op(&self.inner).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let delay = Duration::from_millis(BACKOFF_BASE_MS * u64::from(attempt));
                    tracing::warn!(
                        attempt,
                        provider = self.inner.provider_name(),
                        error = %e,
                        "transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<P: LanguageProvider> LanguageProvider for RetryingProvider<P> {
    async fn detect_language(&self, text: &str) -> Result<String> {
        self.with_retry(|p| p.detect_language(text)).await
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        self.with_retry(|p| p.translate(text, target_lang)).await
    }

    async fn score_sentiment(&self, text: &str) -> Result<f32> {
        self.with_retry(|p| p.score_sentiment(text)).await
    }

    async fn classify(
        &self,
        text: &str,
        candidates: &[String],
        task_hint: Option<&str>,
    ) -> Result<String> {
        self.with_retry(|p| p.classify(text, candidates, task_hint))
            .await
    }

    async fn summarize(&self, instruction: &str, text: &str) -> Result<String> {
        self.with_retry(|p| p.summarize(instruction, text)).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

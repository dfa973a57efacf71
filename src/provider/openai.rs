//! OpenAI provider (Chat Completions API). Each logical operation is one
//! chat call with a fixed system instruction and a low temperature.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{parse_sentiment_reply, sanitize_label, LanguageProvider};
use crate::config::provider::ProviderConfig;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("transcript-insights/0.1")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self {
            http,
            api_key: config.api_key.clone(),
            model,
        }
    }

    /// One chat completion round-trip. Transient transport/status failures
    /// surface as errors carrying the underlying `reqwest::Error` so the
    /// retry wrapper can classify them.
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        anyhow::ensure!(!self.api_key.is_empty(), "OpenAI api key is empty");

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
            max_tokens,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?
            .error_for_status()
            .context("openai non-2xx")?;

        let body: Resp = resp.json().await.context("openai response body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        anyhow::ensure!(!content.is_empty(), "openai returned an empty completion");
        Ok(content)
    }
}

#[async_trait]
impl LanguageProvider for OpenAiProvider {
    async fn detect_language(&self, text: &str) -> Result<String> {
        let sys = "Identify the language of the user text. Reply with the ISO 639-1 code only (e.g. \"en\", \"fr\", \"de\"). No other words.";
        let reply = self.chat(sys, text, 8).await?;
        Ok(sanitize_label(&reply))
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        // Turn boundaries and speaker labels must survive translation, or
        // downstream classification loses the conversational structure.
        let sys = format!(
            "Translate the user text into the language with ISO 639-1 code \"{target_lang}\". \
             The text is a conversation transcript: keep every speaker label (e.g. \"Customer:\", \"Agent:\") \
             and every turn on its own line exactly as in the source. Output only the translation."
        );
        self.chat(&sys, text, 2048).await
    }

    async fn score_sentiment(&self, text: &str) -> Result<f32> {
        let sys = "Rate the overall customer sentiment of the conversation. Reply with a single number between -1.0 (very negative) and 1.0 (very positive). No other words.";
        let reply = self.chat(sys, text, 8).await?;
        parse_sentiment_reply(&reply)
    }

    async fn classify(
        &self,
        text: &str,
        candidates: &[String],
        task_hint: Option<&str>,
    ) -> Result<String> {
        anyhow::ensure!(!candidates.is_empty(), "classify called with no candidates");
        let hint = task_hint.unwrap_or("topic");
        let sys = format!(
            "Classify the {hint} of the conversation. Reply with exactly one label from this list, verbatim, and nothing else: {}",
            candidates.join("; ")
        );
        let reply = self.chat(&sys, text, 32).await?;
        Ok(sanitize_label(&reply))
    }

    async fn summarize(&self, instruction: &str, text: &str) -> Result<String> {
        self.chat(instruction, text, 512).await
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

//! Language detection wrapper. Detection never fails: blank input, provider
//! errors and malformed codes all collapse to [`DetectedLanguage::Unknown`],
//! which downstream treats as "not English".

use serde::{Deserialize, Serialize};

use crate::provider::LanguageProvider;

pub const UNKNOWN_LANGUAGE: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectedLanguage {
    Known(String),
    Unknown,
}

impl DetectedLanguage {
    pub fn code(&self) -> &str {
        match self {
            DetectedLanguage::Known(code) => code,
            DetectedLanguage::Unknown => UNKNOWN_LANGUAGE,
        }
    }

    pub fn is_english(&self) -> bool {
        matches!(self, DetectedLanguage::Known(code) if code == "en")
    }
}

/// Normalize a raw provider reply into a usable code: trimmed, lowercase,
/// 2..=8 alphabetic chars. Anything else is treated as undetectable.
fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().trim_matches(|c: char| !c.is_alphabetic()).to_ascii_lowercase();
    if (2..=8).contains(&code.chars().count()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

/// Detect the language of `text`. All failure modes yield `Unknown`.
pub async fn detect(provider: &dyn LanguageProvider, text: &str) -> DetectedLanguage {
    if text.trim().is_empty() {
        return DetectedLanguage::Unknown;
    }
    match provider.detect_language(text).await {
        Ok(raw) => match normalize_code(&raw) {
            Some(code) => DetectedLanguage::Known(code),
            None => {
                tracing::debug!(reply = %raw, "unusable language code from provider");
                DetectedLanguage::Unknown
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "language detection failed");
            DetectedLanguage::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    #[test]
    fn normalize_accepts_iso_codes_and_rejects_noise() {
        assert_eq!(normalize_code(" FR "), Some("fr".to_string()));
        assert_eq!(normalize_code("\"en\""), Some("en".to_string()));
        assert_eq!(normalize_code("I think it is French."), None);
        assert_eq!(normalize_code("123"), None);
        assert_eq!(normalize_code(""), None);
    }

    #[tokio::test]
    async fn blank_input_is_unknown_without_a_call() {
        let mock = MockProvider::new();
        let lang = detect(&mock, "   ").await;
        assert_eq!(lang, DetectedLanguage::Unknown);
        assert_eq!(mock.calls("detect_language"), 0);
    }

    #[tokio::test]
    async fn provider_failure_collapses_to_unknown() {
        let mock = MockProvider::failing();
        let lang = detect(&mock, "Bonjour").await;
        assert_eq!(lang, DetectedLanguage::Unknown);
        assert_eq!(lang.code(), UNKNOWN_LANGUAGE);
    }

    #[tokio::test]
    async fn english_is_english() {
        let mock = MockProvider::new();
        let lang = detect(&mock, "Hello, I need help with my order.").await;
        assert!(lang.is_english());
    }
}

//! Enrichment pipeline: filter → detect → translate → sentiment → primary
//! topic → secondary topic, producing at most one enriched row per raw
//! record. Stateless between records; every record sees the same taxonomy
//! snapshot for the whole batch.

use anyhow::Error;
use chrono::Utc;

use crate::config::{PipelineConfig, UnknownLabelPolicy};
use crate::interaction::{EnrichedInteraction, RawInteraction};
use crate::language;
use crate::provider::DynProvider;
use crate::taxonomy::{LabelMatch, TaxonomySnapshot, UNCLASSIFIED};

/// Pipeline stage names, used in logs and failure accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Translate,
    Sentiment,
    ClassifyPrimary,
    ClassifySecondary,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Translate => "translate",
            Stage::Sentiment => "sentiment",
            Stage::ClassifyPrimary => "classify_primary",
            Stage::ClassifySecondary => "classify_secondary",
        }
    }
}

/// Deliberate per-record exclusions; these are policy, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Transcript at or under the minimum length.
    TooShort,
    /// Classifier label outside the taxonomy and policy is `Exclude`.
    UnknownLabel { stage: Stage, label: String },
}

/// A provider failure at some stage. The record is excluded from the batch
/// output (fail-open); the runner counts these toward outage detection.
#[derive(Debug)]
pub struct RecordFailure {
    pub seq: u64,
    pub stage: Stage,
    pub error: Error,
}

/// Result of pushing one raw record through the pipeline.
#[derive(Debug)]
pub enum RecordOutcome {
    Enriched(Box<EnrichedInteraction>),
    Skipped { seq: u64, reason: SkipReason },
    Failed(RecordFailure),
}

pub struct Enricher {
    provider: DynProvider,
    min_transcript_length: usize,
    target_language: String,
    unknown_label_policy: UnknownLabelPolicy,
    fallback_topic: String,
}

impl Enricher {
    pub fn new(provider: DynProvider, cfg: &PipelineConfig) -> Self {
        Self {
            provider,
            min_transcript_length: cfg.min_transcript_length,
            target_language: cfg.target_language.clone(),
            unknown_label_policy: cfg.unknown_label_policy,
            fallback_topic: cfg.fallback_topic.clone(),
        }
    }

    /// Enrich one record against a batch-wide taxonomy snapshot.
    pub async fn enrich(&self, snapshot: &TaxonomySnapshot, raw: &RawInteraction) -> RecordOutcome {
        // 1) Filter: too-short transcripts are meaningless to detect or
        // classify; they are consumed without output.
        if raw.transcript.chars().count() <= self.min_transcript_length {
            return RecordOutcome::Skipped {
                seq: raw.seq,
                reason: SkipReason::TooShort,
            };
        }

        // 2) Detect. Never fails; Unknown means "not English" downstream.
        let detected = language::detect(self.provider.as_ref(), &raw.transcript).await;

        // 3) Translate. English passes through verbatim with no provider
        // call; anything else gets exactly one translate attempt.
        let translated = if detected.is_english() {
            raw.transcript.clone()
        } else {
            match self
                .provider
                .translate(&raw.transcript, &self.target_language)
                .await
            {
                Ok(text) => text,
                Err(error) => {
                    return RecordOutcome::Failed(RecordFailure {
                        seq: raw.seq,
                        stage: Stage::Translate,
                        error,
                    })
                }
            }
        };

        // 4) Sentiment on the translated (or passed-through) text.
        let sentiment = match self.provider.score_sentiment(&translated).await {
            Ok(score) => score.clamp(-1.0, 1.0),
            Err(error) => {
                return RecordOutcome::Failed(RecordFailure {
                    seq: raw.seq,
                    stage: Stage::Sentiment,
                    error,
                })
            }
        };

        // 5) Primary topic over the snapshot's full topic list.
        let topics = snapshot.topics();
        let primary_label = match self
            .provider
            .classify(&translated, &topics, Some("primary topic"))
            .await
        {
            Ok(label) => label,
            Err(error) => {
                return RecordOutcome::Failed(RecordFailure {
                    seq: raw.seq,
                    stage: Stage::ClassifyPrimary,
                    error,
                })
            }
        };
        let primary = match snapshot.resolve_topic(&primary_label) {
            LabelMatch::Known(topic) => topic,
            LabelMatch::Unknown(raw_label) => {
                tracing::warn!(
                    seq = raw.seq,
                    label = %raw_label,
                    "primary label outside taxonomy"
                );
                match self.unknown_label_policy {
                    UnknownLabelPolicy::Coerce => self.fallback_topic.clone(),
                    UnknownLabelPolicy::Exclude => {
                        return RecordOutcome::Skipped {
                            seq: raw.seq,
                            reason: SkipReason::UnknownLabel {
                                stage: Stage::ClassifyPrimary,
                                label: raw_label,
                            },
                        }
                    }
                }
            }
        };

        // 6) Secondary topic, scoped to the resolved primary. An empty
        // candidate set yields the sentinel without invoking the classifier.
        let subtopics = snapshot.subtopics_for(&primary);
        let secondary = if subtopics.is_empty() {
            UNCLASSIFIED.to_string()
        } else {
            let label = match self
                .provider
                .classify(&translated, &subtopics, Some("secondary topic"))
                .await
            {
                Ok(label) => label,
                Err(error) => {
                    return RecordOutcome::Failed(RecordFailure {
                        seq: raw.seq,
                        stage: Stage::ClassifySecondary,
                        error,
                    })
                }
            };
            match snapshot.resolve_subtopic(&primary, &label) {
                LabelMatch::Known(subtopic) => subtopic,
                LabelMatch::Unknown(raw_label) => {
                    tracing::warn!(
                        seq = raw.seq,
                        topic = %primary,
                        label = %raw_label,
                        "secondary label outside taxonomy"
                    );
                    match self.unknown_label_policy {
                        UnknownLabelPolicy::Coerce => UNCLASSIFIED.to_string(),
                        UnknownLabelPolicy::Exclude => {
                            return RecordOutcome::Skipped {
                                seq: raw.seq,
                                reason: SkipReason::UnknownLabel {
                                    stage: Stage::ClassifySecondary,
                                    label: raw_label,
                                },
                            }
                        }
                    }
                }
            }
        };

        RecordOutcome::Enriched(Box::new(EnrichedInteraction {
            source_seq: raw.seq,
            source_key: raw.fingerprint(),
            source_transcript: raw.transcript.clone(),
            original_language: detected.code().to_string(),
            translated_transcript: translated,
            sentiment,
            primary_topic: primary,
            secondary_topic: secondary,
            processed_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::taxonomy::{TaxonomyEntry, TaxonomySnapshot};
    use std::sync::Arc;

    fn snapshot() -> TaxonomySnapshot {
        TaxonomySnapshot::new(vec![
            TaxonomyEntry {
                topic: "Delivery issues".into(),
                subtopic: "N/A".into(),
            },
            TaxonomyEntry {
                topic: "Billing".into(),
                subtopic: "Refunds".into(),
            },
        ])
        .unwrap()
    }

    fn raw(seq: u64, transcript: &str) -> RawInteraction {
        RawInteraction {
            seq,
            created_date: None,
            language_hint: None,
            country: None,
            product: None,
            category: None,
            damage_type: None,
            transcript: transcript.to_string(),
        }
    }

    fn enricher(mock: Arc<MockProvider>) -> Enricher {
        Enricher::new(mock, &PipelineConfig::default())
    }

    #[tokio::test]
    async fn short_transcript_is_skipped_without_provider_calls() {
        let mock = Arc::new(MockProvider::new());
        let e = enricher(mock.clone());
        let out = e.enrich(&snapshot(), &raw(1, "Hi.")).await;
        assert!(matches!(
            out,
            RecordOutcome::Skipped {
                reason: SkipReason::TooShort,
                ..
            }
        ));
        assert_eq!(mock.calls("detect_language"), 0);
        assert_eq!(mock.calls("translate"), 0);
    }

    #[tokio::test]
    async fn english_passes_through_without_translation() {
        let mock = Arc::new(MockProvider::new());
        let e = enricher(mock.clone());
        let text = "Customer: My parcel is late.\nAgent: Sorry about that.";
        let out = e.enrich(&snapshot(), &raw(1, text)).await;
        let RecordOutcome::Enriched(row) = out else {
            panic!("expected enrichment");
        };
        assert_eq!(row.translated_transcript, text);
        assert_eq!(row.original_language, "en");
        assert_eq!(mock.calls("translate"), 0);
        assert!((-1.0..=1.0).contains(&row.sentiment));
    }

    #[tokio::test]
    async fn unknown_label_coerces_to_fallback_by_default() {
        let mock = Arc::new(MockProvider::new());
        mock.push_classify_reply("Completely made up topic");
        let e = enricher(mock.clone());
        let out = e
            .enrich(&snapshot(), &raw(1, "Customer: I want to talk about something odd."))
            .await;
        let RecordOutcome::Enriched(row) = out else {
            panic!("expected enrichment");
        };
        assert_eq!(row.primary_topic, "Other");
        // "Other" has no subtopics in the snapshot: sentinel, no second call.
        assert_eq!(row.secondary_topic, UNCLASSIFIED);
        assert_eq!(mock.calls("classify"), 1);
    }

    #[tokio::test]
    async fn unknown_label_excludes_when_configured() {
        let mock = Arc::new(MockProvider::new());
        mock.push_classify_reply("Completely made up topic");
        let cfg = PipelineConfig {
            unknown_label_policy: UnknownLabelPolicy::Exclude,
            ..Default::default()
        };
        let e = Enricher::new(mock, &cfg);
        let out = e
            .enrich(&snapshot(), &raw(7, "Customer: Something odd again."))
            .await;
        assert!(matches!(
            out,
            RecordOutcome::Skipped {
                seq: 7,
                reason: SkipReason::UnknownLabel { .. },
            }
        ));
    }

    #[tokio::test]
    async fn translation_failure_fails_the_record_at_translate() {
        let mock = Arc::new(MockProvider::failing());
        let e = enricher(mock);
        // Detection fails too, collapsing to Unknown, which forces a
        // translation attempt that then fails.
        let out = e
            .enrich(&snapshot(), &raw(3, "Customer: Bonjour, mon colis est en retard."))
            .await;
        let RecordOutcome::Failed(failure) = out else {
            panic!("expected failure");
        };
        assert_eq!(failure.seq, 3);
        assert_eq!(failure.stage, Stage::Translate);
    }

    #[tokio::test]
    async fn na_only_topic_gets_na_secondary() {
        let mock = Arc::new(MockProvider::new());
        mock.push_classify_reply("Delivery issues");
        let e = enricher(mock.clone());
        let out = e
            .enrich(&snapshot(), &raw(4, "Customer: My delivery never arrived!"))
            .await;
        let RecordOutcome::Enriched(row) = out else {
            panic!("expected enrichment");
        };
        assert_eq!(row.primary_topic, "Delivery issues");
        assert_eq!(row.secondary_topic, "N/A");
        // One primary call + one secondary call over the ["N/A"] set.
        assert_eq!(mock.calls("classify"), 2);
    }

    #[tokio::test]
    async fn french_scenario_end_to_end() {
        let mock = Arc::new(MockProvider::new());
        mock.push_classify_reply("Billing");
        mock.push_classify_reply("Refunds");
        let e = enricher(mock.clone());
        let out = e
            .enrich(
                &snapshot(),
                &raw(5, "Customer: Bonjour.\nAgent: Bonjour, comment puis-je vous aider?"),
            )
            .await;
        let RecordOutcome::Enriched(row) = out else {
            panic!("expected enrichment");
        };
        assert_eq!(row.original_language, "fr");
        assert_eq!(mock.calls("translate"), 1);
        assert_eq!(row.translated_transcript.lines().count(), 2);
        assert_ne!(row.translated_transcript, row.source_transcript);
        assert!((-1.0..=1.0).contains(&row.sentiment));
        assert_eq!(row.primary_topic, "Billing");
        assert_eq!(row.secondary_topic, "Refunds");
    }
}

//! Core record shapes: raw transcripts as they arrive, and the enriched rows
//! the pipeline emits. Raw records are immutable once ingested; enriched rows
//! are created at most once per raw record and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One customer interaction as it sits in the append-only input log.
///
/// `seq` is assigned by the source from arrival order and is the record's
/// identity for cursor accounting and sink idempotence. The transcript is
/// expected to contain speaker-attributed turns ("Customer: ... Agent: ...");
/// that is a producer contract, not validated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawInteraction {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    /// Producer-supplied language hint. Known to be unreliable; the pipeline
    /// always runs its own detection.
    #[serde(default)]
    pub language_hint: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub damage_type: Option<String>,
    pub transcript: String,
}

impl RawInteraction {
    /// Stable content fingerprint, used alongside `seq` by sinks that need
    /// idempotence across log replays.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.seq.to_be_bytes());
        if let Some(ts) = &self.created_date {
            hasher.update(ts.to_rfc3339().as_bytes());
        }
        hasher.update(self.transcript.as_bytes());
        let digest = hasher.finalize();
        // 16 hex chars are plenty for a dedup key over a per-tenant log.
        format!("{digest:x}")[..16].to_string()
    }
}

/// Output of a successful trip through the enrichment pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedInteraction {
    pub source_seq: u64,
    pub source_key: String,
    pub source_transcript: String,
    /// Detected ISO 639-1-ish code, or "unknown".
    pub original_language: String,
    /// English rendering; equals `source_transcript` for English sources.
    pub translated_transcript: String,
    /// Bounded sentiment in [-1.0, 1.0].
    pub sentiment: f32,
    pub primary_topic: String,
    pub secondary_topic: String,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn fingerprint_is_stable_and_seq_sensitive() {
        let a = raw(1, "Customer: Hello. Agent: Hi.");
        let b = raw(1, "Customer: Hello. Agent: Hi.");
        let c = raw(2, "Customer: Hello. Agent: Hi.");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn raw_interaction_deserializes_with_missing_optionals() {
        let row: RawInteraction =
            serde_json::from_str(r#"{"transcript":"Customer: Hi."}"#).unwrap();
        assert_eq!(row.seq, 0);
        assert!(row.created_date.is_none());
        assert_eq!(row.transcript, "Customer: Hi.");
    }
}

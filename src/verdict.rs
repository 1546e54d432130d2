//! Reduction of an agent transcript to a single eligibility verdict.
//!
//! Generation is non-deterministic: the model may wrap its answer in prose,
//! fence it, emit it bare, revise it across turns, or never produce valid JSON
//! at all. [`TranscriptReducer::reduce`] walks every model-authored text part
//! in order and keeps the last object it could recover. When nothing parses it
//! returns a fixed manual-review record instead of an error, so a batch of
//! judgements never fails on a single row.

use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::transcript::{Part, Transcript};

pub const FINAL_DETERMINATION: &str = "final_determination";
pub const RAW_LOGS: &str = "raw_logs";
pub const DEFAULT_NOTE_FIELD: &str = "error";
pub const FALLBACK_MESSAGE: &str = "Agent failed to produce valid JSON output";
pub const NO_RESPONSE_TEXT: &str = "No response text found";

// ```json { ... } ``` with the language tag optional; shortest object wins.
static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

// First `{` through last `}`.
static RE_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Determination {
    Qualified,
    Disqualified,
    NeedsManualReview,
}

impl Determination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Determination::Qualified => "QUALIFIED",
            Determination::Disqualified => "DISQUALIFIED",
            Determination::NeedsManualReview => "NEEDS_MANUAL_REVIEW",
        }
    }
}

impl fmt::Display for Determination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Determination {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "QUALIFIED" => Ok(Determination::Qualified),
            "DISQUALIFIED" => Ok(Determination::Disqualified),
            "NEEDS_MANUAL_REVIEW" => Ok(Determination::NeedsManualReview),
            other => Err(format!("unknown determination '{other}'")),
        }
    }
}

/// Decision record for one judging request.
///
/// The success payload is whatever object the agent produced; no schema is
/// imposed beyond "valid JSON object".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verdict(Map<String, Value>);

impl Verdict {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The manual-review record produced when no object could be recovered.
    pub fn fallback(note_field: &str, raw_logs: Option<&str>) -> Self {
        let mut fields = Map::new();
        fields.insert(
            FINAL_DETERMINATION.to_string(),
            Value::String(Determination::NeedsManualReview.as_str().to_string()),
        );
        fields.insert(
            note_field.to_string(),
            Value::String(FALLBACK_MESSAGE.to_string()),
        );
        fields.insert(
            RAW_LOGS.to_string(),
            Value::String(raw_logs.unwrap_or(NO_RESPONSE_TEXT).to_string()),
        );
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn final_determination(&self) -> Option<&str> {
        self.0.get(FINAL_DETERMINATION).and_then(Value::as_str)
    }

    pub fn determination(&self) -> Option<Determination> {
        self.final_determination()
            .and_then(|value| value.parse().ok())
    }

    /// True when this verdict has the exact shape of a fallback record for `note_field`.
    pub fn is_fallback(&self, note_field: &str) -> bool {
        self.determination() == Some(Determination::NeedsManualReview)
            && self.0.get(note_field).and_then(Value::as_str) == Some(FALLBACK_MESSAGE)
            && self.0.contains_key(RAW_LOGS)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Verdict> for Value {
    fn from(verdict: Verdict) -> Self {
        verdict.into_value()
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptReducer {
    note_field: String,
}

impl Default for TranscriptReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptReducer {
    pub fn new() -> Self {
        Self {
            note_field: DEFAULT_NOTE_FIELD.to_string(),
        }
    }

    pub fn with_note_field(mut self, note_field: impl Into<String>) -> Self {
        self.note_field = note_field.into();
        self
    }

    pub fn note_field(&self) -> &str {
        &self.note_field
    }

    /// Total: every transcript, including an empty one, yields exactly one verdict.
    pub fn reduce(&self, transcript: &Transcript) -> Verdict {
        let mut candidate: Option<Map<String, Value>> = None;
        let mut all_text: Vec<&str> = Vec::new();

        for turn in transcript.turns().iter().filter(|turn| turn.is_model()) {
            for text in turn.parts.iter().filter_map(Part::non_empty_text) {
                all_text.push(text);

                if let Some(object) = extract_fenced_object(text) {
                    candidate = Some(object);
                    continue;
                }

                if let Some(object) = extract_bare_object(text) {
                    candidate = Some(object);
                }
            }
        }

        match candidate {
            Some(object) => Verdict::from_map(object),
            None => {
                tracing::debug!(
                    texts = all_text.len(),
                    "no structured object recovered from transcript"
                );
                Verdict::fallback(&self.note_field, all_text.last().copied())
            }
        }
    }
}

/// Reduces with the default note field.
pub fn reduce(transcript: &Transcript) -> Verdict {
    TranscriptReducer::new().reduce(transcript)
}

fn extract_fenced_object(text: &str) -> Option<Map<String, Value>> {
    let captured = RE_FENCED.captures(text)?.get(1)?;
    parse_object(captured.as_str())
}

fn extract_bare_object(text: &str) -> Option<Map<String, Value>> {
    let span = RE_BARE.find(text)?;
    parse_object(span.as_str())
}

fn parse_object(span: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Map<String, Value>>(span) {
        Ok(object) => Some(object),
        Err(error) => {
            tracing::trace!(%error, "discarding unparseable candidate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn fenced_extraction_accepts_untagged_fence() {
        let text = "answer:\n```\n{\"final_determination\": \"DISQUALIFIED\"}\n```";
        assert_eq!(
            extract_fenced_object(text),
            Some(object(json!({"final_determination": "DISQUALIFIED"})))
        );
    }

    #[test]
    fn fenced_extraction_takes_first_fence() {
        let text = "```json\n{\"a\": 1}\n```\nthen\n```json\n{\"a\": 2}\n```";
        assert_eq!(extract_fenced_object(text), Some(object(json!({"a": 1}))));
    }

    #[test]
    fn fenced_extraction_expands_past_nested_braces() {
        let text = "```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(
            extract_fenced_object(text),
            Some(object(json!({"a": {"b": 1}})))
        );
    }

    #[test]
    fn fenced_extraction_ignores_other_languages() {
        let text = "```python\n{\"a\": 1}\n```";
        assert_eq!(extract_fenced_object(text), None);
    }

    #[test]
    fn bare_extraction_spans_outermost_braces() {
        let text = "prefix {\"a\": {\"b\": [1, 2]}} suffix";
        assert_eq!(
            extract_bare_object(text),
            Some(object(json!({"a": {"b": [1, 2]}})))
        );
    }

    #[test]
    fn bare_extraction_fails_when_span_covers_two_objects() {
        assert_eq!(extract_bare_object("{\"a\": 1} and {\"b\": 2}"), None);
    }

    #[test]
    fn parse_rejects_non_object_json() {
        assert_eq!(parse_object("[1, 2]"), None);
        assert_eq!(parse_object("{\"a\": 1,}"), None);
    }

    #[test]
    fn determination_parses_case_insensitively() {
        assert_eq!(
            "needs_manual_review".parse::<Determination>(),
            Ok(Determination::NeedsManualReview)
        );
        assert!("MAYBE".parse::<Determination>().is_err());
    }

    #[test]
    fn fallback_has_exact_shape() {
        let verdict = Verdict::fallback("notes", None);
        assert_eq!(
            verdict.clone().into_value(),
            json!({
                "final_determination": "NEEDS_MANUAL_REVIEW",
                "notes": FALLBACK_MESSAGE,
                "raw_logs": NO_RESPONSE_TEXT,
            })
        );
        assert!(verdict.is_fallback("notes"));
        assert!(!verdict.is_fallback(DEFAULT_NOTE_FIELD));
    }

    #[test]
    fn verdict_serializes_transparently() {
        let verdict = Verdict::from_map(object(json!({"final_determination": "QUALIFIED"})));
        let encoded = serde_json::to_string(&verdict).expect("encode");
        assert_eq!(encoded, r#"{"final_determination":"QUALIFIED"}"#);
        assert_eq!(verdict.determination(), Some(Determination::Qualified));
    }
}

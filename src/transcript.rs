//! Ordered record of one agent interaction.
//!
//! A [`Transcript`] is what a [`TranscriptGenerator`](crate::judge::TranscriptGenerator)
//! hands back after a judging run. It is fully materialized before anything
//! inspects it, and it round-trips through JSON so a run can be saved and
//! reduced again offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallPart {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponsePart {
    pub name: String,
    #[serde(default)]
    pub response: Value,
}

/// One piece of a turn. Text parts carry `text`; tool traffic carries one of
/// the function payloads and no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponsePart>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCallPart {
                name: name.into(),
                args,
            }),
            ..Self::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponsePart {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }

    /// Text of the part, `None` for tool traffic and empty strings.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: TurnRole, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, vec![Part::text(text)])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Model, vec![Part::text(text)])
    }

    pub fn tool(parts: Vec<Part>) -> Self {
        Self::new(TurnRole::Tool, parts)
    }

    pub fn is_model(&self) -> bool {
        self.role == TurnRole::Model
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            generated_at: None,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn stamp(mut self) -> Self {
        self.generated_at = Some(Utc::now());
        self
    }

    /// Every non-empty text authored by the model, in transcript order.
    pub fn model_texts(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .filter(|turn| turn.is_model())
            .flat_map(|turn| turn.parts.iter())
            .filter_map(Part::non_empty_text)
    }

    pub fn last_model_text(&self) -> Option<&str> {
        self.model_texts().last()
    }

    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::{validate_template, AgentError};
use crate::judge::prompts;
use crate::judge::submission::SubmissionField;
use crate::verdict::DEFAULT_NOTE_FIELD;

fn default_version() -> String {
    "0.1".to_string()
}

fn default_note_field() -> String {
    DEFAULT_NOTE_FIELD.to_string()
}

#[derive(Debug, Error)]
pub enum PrizeSchemaError {
    #[error("failed to read prize catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse prize catalog YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("prize '{prize}' has an invalid prompt template: {source}")]
    InvalidTemplate { prize: String, source: AgentError },
    #[error("prize id must not be empty")]
    EmptyId,
    #[error("prize '{0}' is defined more than once")]
    Duplicate(String),
}

/// Tool families a prize checker may be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Github,
    Website,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// System instructions for the checker agent.
    pub instructions: String,
    /// Handlebars template rendered against the submission.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_fields: Vec<SubmissionField>,
    /// Key of the explanatory note on fallback verdicts.
    #[serde(default = "default_note_field")]
    pub note_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl PrizeDefinition {
    fn builtin(
        id: &str,
        name: &str,
        description: &str,
        instructions: &str,
        prompt: &str,
        tools: Vec<ToolKind>,
        required_fields: Vec<SubmissionField>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            instructions: instructions.to_string(),
            prompt: prompt.to_string(),
            tools,
            required_fields,
            note_field: default_note_field(),
            model: None,
            temperature: None,
        }
    }

    fn validate(&self) -> Result<(), PrizeSchemaError> {
        if self.id.trim().is_empty() {
            return Err(PrizeSchemaError::EmptyId);
        }
        validate_template(&self.prompt).map_err(|source| PrizeSchemaError::InvalidTemplate {
            prize: self.id.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub prizes: Vec<PrizeDefinition>,
}

impl PrizeDocument {
    pub fn from_yaml_str(input: &str) -> Result<Self, PrizeSchemaError> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, PrizeSchemaError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Clone)]
pub struct PrizeCatalog {
    prizes: Vec<PrizeDefinition>,
}

impl Default for PrizeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PrizeCatalog {
    pub fn empty() -> Self {
        Self { prizes: Vec::new() }
    }

    pub fn builtin() -> Self {
        use SubmissionField::{ProjectNumber, ProjectUrl, RepoUrl};

        let mut code_review = PrizeDefinition::builtin(
            "code-review",
            "Code Review",
            "Rubric-based review of a fellowship code sample.",
            prompts::CODE_REVIEW_INSTRUCTIONS,
            prompts::REPOSITORY_PROMPT,
            vec![ToolKind::Github],
            vec![RepoUrl],
        );
        code_review.note_field = "notes".to_string();

        Self {
            prizes: vec![
                PrizeDefinition::builtin(
                    "gemini",
                    "Best Use of Gemini",
                    "Gemini API usage in code plus a valid Google Cloud project number.",
                    prompts::GEMINI_INSTRUCTIONS,
                    prompts::GEMINI_PROMPT,
                    vec![ToolKind::Github],
                    vec![RepoUrl, ProjectNumber],
                ),
                PrizeDefinition::builtin(
                    "dot-tech",
                    "Best .Tech Domain",
                    "A live website on a registered .tech domain.",
                    prompts::DOT_TECH_INSTRUCTIONS,
                    prompts::DOT_TECH_PROMPT,
                    vec![ToolKind::Website],
                    vec![ProjectUrl],
                ),
                PrizeDefinition::builtin(
                    "mongodb",
                    "Best Use of MongoDB Atlas",
                    "A MongoDB driver used by application code.",
                    prompts::MONGODB_INSTRUCTIONS,
                    prompts::REPOSITORY_PROMPT,
                    vec![ToolKind::Github],
                    vec![RepoUrl],
                ),
                PrizeDefinition::builtin(
                    "elevenlabs",
                    "Best Use of ElevenLabs",
                    "ElevenLabs voice APIs called by application code.",
                    prompts::ELEVENLABS_INSTRUCTIONS,
                    prompts::REPOSITORY_PROMPT,
                    vec![ToolKind::Github],
                    vec![RepoUrl],
                ),
                code_review,
            ],
        }
    }

    /// Builds a catalog from a document alone, without the built-in prizes.
    pub fn from_document(document: PrizeDocument) -> Result<Self, PrizeSchemaError> {
        let mut catalog = Self::empty();
        for prize in document.prizes {
            prize.validate()?;
            if catalog.position(&prize.id).is_some() {
                return Err(PrizeSchemaError::Duplicate(prize.id));
            }
            catalog.prizes.push(prize);
        }
        Ok(catalog)
    }

    /// Adds the document's prizes, replacing any with the same id.
    pub fn merge(&mut self, document: PrizeDocument) -> Result<(), PrizeSchemaError> {
        let overrides = Self::from_document(document)?;
        for prize in overrides.prizes {
            match self.position(&prize.id) {
                Some(index) => self.prizes[index] = prize,
                None => self.prizes.push(prize),
            }
        }
        Ok(())
    }

    /// Built-in prizes overlaid with the catalog file at `path`.
    pub fn load_with_overrides(path: impl AsRef<Path>) -> Result<Self, PrizeSchemaError> {
        let content = std::fs::read_to_string(path)?;
        let mut catalog = Self::builtin();
        catalog.merge(PrizeDocument::from_yaml_str(&content)?)?;
        Ok(catalog)
    }

    fn position(&self, id: &str) -> Option<usize> {
        let want = normalize_prize_key(id);
        self.prizes
            .iter()
            .position(|prize| normalize_prize_key(&prize.id) == want)
    }

    /// Case-insensitive lookup with a fuzzy fallback for small typos.
    pub fn get(&self, id: &str) -> Option<&PrizeDefinition> {
        let want = normalize_prize_key(id);
        if want.is_empty() {
            return None;
        }

        if let Some(index) = self.position(&want) {
            return Some(&self.prizes[index]);
        }

        let mut best: Option<(&PrizeDefinition, usize)> = None;
        for prize in &self.prizes {
            let distance = strsim::levenshtein(&want, &normalize_prize_key(&prize.id));
            if best.map_or(true, |(_, current)| distance < current) {
                best = Some((prize, distance));
            }
        }

        best.filter(|(_, distance)| *distance <= 2)
            .map(|(prize, _)| prize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrizeDefinition> {
        self.prizes.iter()
    }

    pub fn len(&self) -> usize {
        self.prizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prizes.is_empty()
    }

    pub fn to_document(&self) -> PrizeDocument {
        PrizeDocument {
            version: default_version(),
            prizes: self.prizes.clone(),
        }
    }
}

fn normalize_prize_key(id: &str) -> String {
    id.trim().to_lowercase().replace(['_', ' '], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = PrizeCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        for prize in catalog.iter() {
            prize.validate().expect("builtin prize should validate");
        }
        assert_eq!(catalog.get("code-review").map(|p| p.note_field.as_str()), Some("notes"));
        assert_eq!(catalog.get("gemini").map(|p| p.note_field.as_str()), Some("error"));
    }

    #[test]
    fn lookup_is_case_insensitive_and_fuzzy() {
        let catalog = PrizeCatalog::builtin();
        assert_eq!(catalog.get("MongoDB").map(|p| p.id.as_str()), Some("mongodb"));
        assert_eq!(catalog.get("dot_tech").map(|p| p.id.as_str()), Some("dot-tech"));
        assert_eq!(catalog.get("gemeni").map(|p| p.id.as_str()), Some("gemini"));
        assert!(catalog.get("best-hardware-hack").is_none());
        assert!(catalog.get("  ").is_none());
    }

    #[test]
    fn yaml_overrides_replace_and_extend() {
        let yaml = r#"
prizes:
  - id: gemini
    name: Gemini (strict)
    instructions: Only accept gemini-2.5 models.
    prompt: "Repo {{repo_url}}"
    tools: [github]
    required_fields: [repo_url]
    note_field: reason
  - id: auth0
    name: Best Use of Auth0
    instructions: Look for Auth0 SDKs.
    prompt: "Repo {{repo_url}}"
    tools: [github]
"#;
        let mut catalog = PrizeCatalog::builtin();
        catalog
            .merge(PrizeDocument::from_yaml_str(yaml).expect("yaml"))
            .expect("merge");

        assert_eq!(catalog.len(), 6);
        let gemini = catalog.get("gemini").expect("gemini");
        assert_eq!(gemini.name, "Gemini (strict)");
        assert_eq!(gemini.note_field, "reason");
        assert_eq!(gemini.required_fields, vec![SubmissionField::RepoUrl]);
        let auth0 = catalog.get("auth0").expect("auth0");
        assert_eq!(auth0.note_field, DEFAULT_NOTE_FIELD);
    }

    #[test]
    fn rejects_broken_templates_and_duplicates() {
        let broken = r#"
prizes:
  - id: broken
    name: Broken
    instructions: x
    prompt: "{{#if repo_url}} unterminated"
"#;
        let error = PrizeCatalog::from_document(PrizeDocument::from_yaml_str(broken).expect("yaml"))
            .unwrap_err();
        assert!(matches!(error, PrizeSchemaError::InvalidTemplate { .. }));

        let duplicate = r#"
prizes:
  - {id: a, name: A, instructions: x, prompt: y}
  - {id: A, name: A2, instructions: x, prompt: y}
"#;
        let error =
            PrizeCatalog::from_document(PrizeDocument::from_yaml_str(duplicate).expect("yaml"))
                .unwrap_err();
        assert!(matches!(error, PrizeSchemaError::Duplicate(id) if id == "A"));
    }

    #[test]
    fn document_roundtrips_through_yaml() {
        let document = PrizeCatalog::builtin().to_document();
        let yaml = document.to_yaml_string().expect("yaml");
        let parsed = PrizeDocument::from_yaml_str(&yaml).expect("parse");
        assert_eq!(parsed, document);
    }
}

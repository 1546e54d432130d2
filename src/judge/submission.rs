use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://\S+|www\.\S+|[a-z0-9-]+\.tech\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionField {
    RepoUrl,
    ProjectNumber,
    ProjectUrl,
}

impl SubmissionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionField::RepoUrl => "repo_url",
            SubmissionField::ProjectNumber => "project_number",
            SubmissionField::ProjectUrl => "project_url",
        }
    }
}

impl fmt::Display for SubmissionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hackathon project as submitted for judging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
}

impl Submission {
    pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
        self.repo_url = Some(repo_url.into());
        self
    }

    pub fn with_project_number(mut self, project_number: impl Into<String>) -> Self {
        self.project_number = Some(project_number.into());
        self
    }

    pub fn with_project_url(mut self, project_url: impl Into<String>) -> Self {
        self.project_url = Some(project_url.into());
        self
    }

    /// Trimmed, non-empty value of `field`.
    pub fn field(&self, field: SubmissionField) -> Option<&str> {
        let value = match field {
            SubmissionField::RepoUrl => self.repo_url.as_deref(),
            SubmissionField::ProjectNumber => self.project_number.as_deref(),
            SubmissionField::ProjectUrl => self.project_url.as_deref(),
        };
        value.map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn missing<'a>(&self, required: &'a [SubmissionField]) -> Option<&'a SubmissionField> {
        required.iter().find(|field| self.field(**field).is_none())
    }

    /// First URL-like token of the free-text `project_url` field.
    ///
    /// Teams often paste a sentence or several domains; only the first
    /// `http(s)://…`, `www.…` or `<name>.tech` token is kept.
    pub fn domain_candidate(&self) -> Option<String> {
        let raw = self.field(SubmissionField::ProjectUrl)?;
        RE_DOMAIN.find(raw).map(|found| {
            found
                .as_str()
                .trim_end_matches(|c: char| matches!(c, ',' | ';' | '.' | ')' | '"' | '\''))
                .to_string()
        })
    }

    /// Trims every field and narrows `project_url` to its domain candidate.
    pub fn normalized(&self) -> Self {
        let trim = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            project_title: trim(&self.project_title),
            repo_url: trim(&self.repo_url),
            project_number: trim(&self.project_number),
            project_url: self.domain_candidate().or_else(|| trim(&self.project_url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(raw: &str) -> Option<String> {
        Submission::default().with_project_url(raw).domain_candidate()
    }

    #[test]
    fn extracts_first_url_like_token() {
        assert_eq!(
            domain("We registered https://snackbot.tech and snack.tech"),
            Some("https://snackbot.tech".to_string())
        );
        assert_eq!(domain("www.snackbot.tech, www.other.tech"), Some("www.snackbot.tech".to_string()));
        assert_eq!(domain("our domain is SnackBot.tech."), Some("SnackBot.tech".to_string()));
        assert_eq!(domain("none"), None);
        assert_eq!(domain("   "), None);
    }

    #[test]
    fn normalized_keeps_raw_url_without_candidate() {
        let submission = Submission::default()
            .with_repo_url("  https://github.com/a/b  ")
            .with_project_url("snackbot.com");
        let normalized = submission.normalized();
        assert_eq!(normalized.repo_url.as_deref(), Some("https://github.com/a/b"));
        assert_eq!(normalized.project_url.as_deref(), Some("snackbot.com"));
        assert_eq!(normalized.project_number, None);
    }

    #[test]
    fn reports_first_missing_field() {
        let submission = Submission::default()
            .with_repo_url("a/b")
            .with_project_number(" ");
        let required = [SubmissionField::RepoUrl, SubmissionField::ProjectNumber];
        assert_eq!(submission.missing(&required), Some(&SubmissionField::ProjectNumber));
    }
}

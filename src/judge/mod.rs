//! Prize judging: prompt an agent about a submission, then reduce its
//! transcript to a verdict.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream::FuturesUnordered, StreamExt};
use thiserror::Error;

use crate::{
    agents::{render_template, Agent, AgentError, RunLimits},
    functions::{
        github::{github_functions, GitHubConfig},
        website::WebsiteStatus,
        DynKernelFunction, FunctionRegistry, ToolChoice,
    },
    transcript::Transcript,
    verdict::{TranscriptReducer, Verdict},
    LLMError, LLMProvider,
};

pub mod prizes;
pub mod prompts;
pub mod submission;

pub use prizes::{PrizeCatalog, PrizeDefinition, PrizeDocument, PrizeSchemaError, ToolKind};
pub use submission::{Submission, SubmissionField};

pub const NO_CHAT_RESPONSE: &str = "No response received.";

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("unknown prize: {0}")]
    UnknownPrize(String),
    #[error("prize '{prize}' requires the '{field}' field")]
    MissingField {
        prize: String,
        field: SubmissionField,
    },
    #[error("failed to render prompt for prize '{prize}': {source}")]
    Prompt { prize: String, source: AgentError },
    #[error("agent run failed: {0}")]
    Agent(#[from] AgentError),
}

/// One generation request: which agent to run and what to ask it.
#[derive(Debug, Clone)]
pub struct JudgeTask {
    pub label: String,
    pub agent: Agent,
    pub prompt: String,
}

/// Capability that turns a task into a finished transcript.
#[async_trait]
pub trait TranscriptGenerator: Send + Sync {
    async fn generate(&self, task: &JudgeTask) -> Result<Transcript, AgentError>;
}

/// Generator backed by an [`LLMProvider`] and the agent tool loop.
pub struct AgentGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    limits: RunLimits,
}

impl AgentGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            limits: RunLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl TranscriptGenerator for AgentGenerator {
    async fn generate(&self, task: &JudgeTask) -> Result<Transcript, AgentError> {
        tracing::debug!(
            task = %task.label,
            provider = self.provider.name(),
            model = task.agent.model_override().unwrap_or(&self.model),
            "generating transcript"
        );
        task.agent
            .run(self.provider.as_ref(), &self.model, &task.prompt, self.limits)
            .await
    }
}

/// Kernel functions available to checker agents, grouped by [`ToolKind`].
#[derive(Clone, Default)]
pub struct Toolbox {
    github: Vec<DynKernelFunction>,
    website: Vec<DynKernelFunction>,
}

impl Toolbox {
    pub fn new(github: GitHubConfig, website_timeout: Duration) -> Result<Self, LLMError> {
        Ok(Self {
            github: github_functions(github)?,
            website: vec![Arc::new(WebsiteStatus::new(website_timeout)?)],
        })
    }

    /// A toolbox with no functions; agents built from it cannot call tools.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_functions(mut self, kind: ToolKind, functions: Vec<DynKernelFunction>) -> Self {
        match kind {
            ToolKind::Github => self.github = functions,
            ToolKind::Website => self.website = functions,
        }
        self
    }

    pub fn registry(&self, kinds: &[ToolKind]) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        for kind in kinds {
            let functions = match kind {
                ToolKind::Github => &self.github,
                ToolKind::Website => &self.website,
            };
            registry.register_all(functions.iter().cloned());
        }
        registry
    }
}

/// Result of one judging run, transcript included for auditing.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub prize: String,
    pub transcript: Transcript,
    pub verdict: Verdict,
}

pub struct Judge {
    generator: Arc<dyn TranscriptGenerator>,
    catalog: PrizeCatalog,
    toolbox: Toolbox,
}

impl Judge {
    pub fn new(generator: Arc<dyn TranscriptGenerator>, catalog: PrizeCatalog, toolbox: Toolbox) -> Self {
        Self {
            generator,
            catalog,
            toolbox,
        }
    }

    pub fn catalog(&self) -> &PrizeCatalog {
        &self.catalog
    }

    /// Resolves the prize and builds the agent task for `submission`.
    pub fn prepare(
        &self,
        prize_id: &str,
        submission: &Submission,
    ) -> Result<(&PrizeDefinition, JudgeTask), JudgeError> {
        let prize = self
            .catalog
            .get(prize_id)
            .ok_or_else(|| JudgeError::UnknownPrize(prize_id.to_string()))?;

        let submission = submission.normalized();
        if let Some(field) = submission.missing(&prize.required_fields) {
            return Err(JudgeError::MissingField {
                prize: prize.id.clone(),
                field: *field,
            });
        }

        let prompt = render_template(&prize.prompt, &submission).map_err(|source| JudgeError::Prompt {
            prize: prize.id.clone(),
            source,
        })?;

        let mut agent = Agent::from_string(prize.id.clone(), prize.instructions.clone())
            .with_description(prize.name.clone());
        if !prize.tools.is_empty() {
            agent = agent
                .with_function_registry(Arc::new(self.toolbox.registry(&prize.tools)))
                .with_tool_choice(ToolChoice::auto());
        }
        if let Some(model) = &prize.model {
            agent = agent.with_model(model.clone());
        }
        if let Some(temperature) = prize.temperature {
            agent = agent.with_temperature(temperature);
        }

        let task = JudgeTask {
            label: prize.id.clone(),
            agent,
            prompt,
        };
        Ok((prize, task))
    }

    pub async fn run(&self, prize_id: &str, submission: &Submission) -> Result<JudgeOutcome, JudgeError> {
        let (prize, task) = self.prepare(prize_id, submission)?;
        let transcript = self.generator.generate(&task).await?;

        let reducer = TranscriptReducer::new().with_note_field(prize.note_field.clone());
        let verdict = reducer.reduce(&transcript);

        if verdict.is_fallback(reducer.note_field()) {
            tracing::warn!(prize = %prize.id, turns = transcript.len(), "agent produced no structured verdict");
        } else {
            tracing::info!(
                prize = %prize.id,
                determination = verdict.final_determination().unwrap_or("<missing>"),
                "verdict recovered"
            );
        }

        Ok(JudgeOutcome {
            prize: prize.id.clone(),
            transcript,
            verdict,
        })
    }

    pub async fn judge(&self, prize_id: &str, submission: &Submission) -> Result<Verdict, JudgeError> {
        Ok(self.run(prize_id, submission).await?.verdict)
    }

    /// Judges several prizes for one submission concurrently; results keep request order.
    pub async fn judge_all<S: AsRef<str>>(
        &self,
        prize_ids: &[S],
        submission: &Submission,
    ) -> Vec<(String, Result<Verdict, JudgeError>)> {
        let mut futures = FuturesUnordered::new();
        for (index, prize_id) in prize_ids.iter().enumerate() {
            let prize_id = prize_id.as_ref();
            futures.push(async move { (index, prize_id.to_string(), self.judge(prize_id, submission).await) });
        }

        let mut results = Vec::with_capacity(prize_ids.len());
        while let Some(result) = futures.next().await {
            results.push(result);
        }
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, prize_id, result)| (prize_id, result))
            .collect()
    }

    /// Free-form assistant reply; repository tools are available to the model.
    pub async fn chat(&self, message: &str) -> Result<String, JudgeError> {
        let agent = Agent::from_string("sidekick", prompts::SIDEKICK_INSTRUCTIONS)
            .with_function_registry(Arc::new(self.toolbox.registry(&[ToolKind::Github])))
            .with_tool_choice(ToolChoice::auto());
        let task = JudgeTask {
            label: "chat".to_string(),
            agent,
            prompt: message.to_string(),
        };

        let transcript = self.generator.generate(&task).await?;
        Ok(transcript
            .last_model_text()
            .unwrap_or(NO_CHAT_RESPONSE)
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopGenerator;

    #[async_trait]
    impl TranscriptGenerator for NoopGenerator {
        async fn generate(&self, _task: &JudgeTask) -> Result<Transcript, AgentError> {
            Ok(Transcript::new())
        }
    }

    fn judge() -> Judge {
        Judge::new(Arc::new(NoopGenerator), PrizeCatalog::builtin(), Toolbox::empty())
    }

    #[test]
    fn prepare_renders_prompt_from_normalized_submission() {
        let judge = judge();
        let submission = Submission::default()
            .with_repo_url(" https://github.com/a/b ")
            .with_project_number("1234567890");
        let (prize, task) = judge.prepare("gemini", &submission).expect("task");
        assert_eq!(prize.id, "gemini");
        assert_eq!(
            task.prompt,
            "Repository: https://github.com/a/b\nGoogle Cloud project number: 1234567890"
        );
        assert_eq!(task.agent.name(), "gemini");
    }

    #[test]
    fn prepare_uses_domain_candidate_for_dot_tech() {
        let judge = judge();
        let submission = Submission::default().with_project_url("We built it at https://snack.tech, enjoy");
        let (_, task) = judge.prepare("dot-tech", &submission).expect("task");
        assert_eq!(task.prompt, "Domain: https://snack.tech");
    }

    #[test]
    fn prepare_reports_missing_field_and_unknown_prize() {
        let judge = judge();
        let submission = Submission::default().with_repo_url("a/b");
        let error = judge.prepare("gemini", &submission).unwrap_err();
        assert!(matches!(
            error,
            JudgeError::MissingField { field: SubmissionField::ProjectNumber, .. }
        ));

        let error = judge.prepare("best-hardware", &submission).unwrap_err();
        assert!(matches!(error, JudgeError::UnknownPrize(id) if id == "best-hardware"));
    }

    #[tokio::test]
    async fn empty_transcript_yields_fallback_verdict() {
        let judge = judge();
        let submission = Submission::default().with_repo_url("a/b");
        let verdict = judge.judge("code-review", &submission).await.expect("verdict");
        assert!(verdict.is_fallback("notes"));
    }

    #[tokio::test]
    async fn chat_without_text_uses_placeholder() {
        let reply = judge().chat("hello").await.expect("reply");
        assert_eq!(reply, NO_CHAT_RESPONSE);
    }
}

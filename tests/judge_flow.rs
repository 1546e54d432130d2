use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{json, Value};
use sidekick::{
    agents::AgentError,
    functions::{FunctionCall, FunctionDefinition, KernelFunction, ToolCall},
    judge::{PrizeDocument, ToolKind},
    providers::scripted::ScriptedProvider,
    transcript::{Transcript, Turn, TurnRole},
    AgentGenerator, Judge, JudgeError, JudgeTask, LLMError, PrizeCatalog, Submission, Toolbox,
    TranscriptGenerator,
};

struct FakeRepository;

#[async_trait]
impl KernelFunction for FakeRepository {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition::new("list_repository_files").with_description("List files.")
    }

    async fn invoke(&self, _arguments: &Value) -> Result<Value, LLMError> {
        Ok(json!({"files": ["README.md", "app/main.py", "requirements.txt"]}))
    }
}

fn toolbox() -> Toolbox {
    Toolbox::empty().with_functions(ToolKind::Github, vec![Arc::new(FakeRepository)])
}

fn gemini_submission() -> Submission {
    Submission::default()
        .with_repo_url("https://github.com/team/snackbot")
        .with_project_number("123456789012")
}

#[tokio::test]
async fn gemini_check_runs_tools_and_returns_final_answer() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_calls(vec![ToolCall::new(FunctionCall::new(
                "list_repository_files",
                json!({"repo_url": "https://github.com/team/snackbot"}),
            ))
            .with_id("call_1")])
            .with_text(
                "Found google.generativeai in app/main.py.\n```json\n{\"gemini_usage_detected\": true, \"model_used\": \"gemini-2.5-flash\", \"final_determination\": \"QUALIFIED\"}\n```",
            ),
    );
    let generator = AgentGenerator::new(provider.clone(), "google/gemini-2.5-flash");
    let judge = Judge::new(Arc::new(generator), PrizeCatalog::builtin(), toolbox());

    let outcome = judge.run("Gemini", &gemini_submission()).await.expect("outcome");

    assert_eq!(outcome.prize, "gemini");
    assert_eq!(
        outcome.verdict.into_value(),
        json!({
            "gemini_usage_detected": true,
            "model_used": "gemini-2.5-flash",
            "final_determination": "QUALIFIED",
        })
    );
    let roles: Vec<TurnRole> = outcome.transcript.turns().iter().map(|turn| turn.role).collect();
    assert_eq!(
        roles,
        vec![TurnRole::User, TurnRole::Model, TurnRole::Tool, TurnRole::Model]
    );

    let requests = provider.requests();
    assert_eq!(requests[0].model, "google/gemini-2.5-flash");
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(
        requests[0].messages[1].text(),
        Some("Repository: https://github.com/team/snackbot\nGoogle Cloud project number: 123456789012")
    );
}

#[tokio::test]
async fn provider_failure_is_not_a_verdict() {
    let generator = AgentGenerator::new(Arc::new(ScriptedProvider::new()), "model-x");
    let judge = Judge::new(Arc::new(generator), PrizeCatalog::builtin(), toolbox());

    let error = judge.judge("mongodb", &gemini_submission()).await.unwrap_err();
    assert!(matches!(error, JudgeError::Agent(AgentError::Provider(_))));
}

#[tokio::test]
async fn code_review_fallback_uses_notes_field() {
    let generator = AgentGenerator::new(
        Arc::new(ScriptedProvider::from_texts(["The repository looks tidy overall."])),
        "model-x",
    );
    let judge = Judge::new(Arc::new(generator), PrizeCatalog::builtin(), toolbox());

    let verdict = judge.judge("code-review", &gemini_submission()).await.expect("verdict");
    assert_eq!(
        verdict.into_value(),
        json!({
            "final_determination": "NEEDS_MANUAL_REVIEW",
            "notes": "Agent failed to produce valid JSON output",
            "raw_logs": "The repository looks tidy overall.",
        })
    );
}

#[tokio::test]
async fn catalog_overrides_reach_the_request() {
    let yaml = r#"
prizes:
  - id: auth0
    name: Best Use of Auth0
    instructions: Look for Auth0 SDKs.
    prompt: "Check {{repo_url}} for Auth0."
    tools: [github]
    required_fields: [repo_url]
    model: anthropic/claude-3-haiku
    temperature: 0.1
"#;
    let mut catalog = PrizeCatalog::builtin();
    catalog
        .merge(PrizeDocument::from_yaml_str(yaml).expect("yaml"))
        .expect("merge");

    let provider = Arc::new(ScriptedProvider::from_texts(["{\"final_determination\": \"DISQUALIFIED\"}"]));
    let generator = AgentGenerator::new(provider.clone(), "google/gemini-2.5-flash");
    let judge = Judge::new(Arc::new(generator), catalog, toolbox());

    let verdict = judge.judge("auth0", &gemini_submission()).await.expect("verdict");
    assert_eq!(verdict.final_determination(), Some("DISQUALIFIED"));

    let requests = provider.requests();
    assert_eq!(requests[0].model, "anthropic/claude-3-haiku");
    assert_eq!(requests[0].temperature, Some(0.1));
    assert_eq!(requests[0].messages[0].text(), Some("Look for Auth0 SDKs."));
    assert_eq!(
        requests[0].messages[1].text(),
        Some("Check https://github.com/team/snackbot for Auth0.")
    );
}

/// Answers each task with a canned text keyed by the task label.
struct ByPrize(HashMap<&'static str, &'static str>);

#[async_trait]
impl TranscriptGenerator for ByPrize {
    async fn generate(&self, task: &JudgeTask) -> Result<Transcript, AgentError> {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user(task.prompt.clone()));
        if let Some(text) = self.0.get(task.label.as_str()) {
            transcript.push(Turn::model(*text));
        }
        Ok(transcript)
    }
}

#[tokio::test]
async fn judge_all_keeps_request_order() {
    let generator = ByPrize(HashMap::from([
        ("mongodb", "{\"final_determination\": \"QUALIFIED\"}"),
        ("elevenlabs", "```json\n{\"final_determination\": \"DISQUALIFIED\"}\n```"),
    ]));
    let judge = Judge::new(Arc::new(generator), PrizeCatalog::builtin(), Toolbox::empty());
    let submission = Submission::default().with_repo_url("https://github.com/team/snackbot");

    let results = judge
        .judge_all(&["elevenlabs", "nope-nope-nope", "mongodb", "gemini"], &submission)
        .await;

    let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["elevenlabs", "nope-nope-nope", "mongodb", "gemini"]);

    assert_eq!(
        results[0].1.as_ref().ok().and_then(|v| v.final_determination()),
        Some("DISQUALIFIED")
    );
    assert!(matches!(results[1].1, Err(JudgeError::UnknownPrize(_))));
    assert_eq!(
        results[2].1.as_ref().ok().and_then(|v| v.final_determination()),
        Some("QUALIFIED")
    );
    assert!(matches!(results[3].1, Err(JudgeError::MissingField { .. })));
}

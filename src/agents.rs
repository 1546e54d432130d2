use std::{
    fmt,
    sync::Arc,
    time::Duration,
};

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time;

use crate::{
    functions::{FunctionRegistry, ToolCall, ToolChoice},
    transcript::{Part, Transcript, Turn, TurnRole},
    types::{ChatMessage, CompletionRequest},
    LLMError, LLMProvider,
};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("template render error: {0}")]
    TemplateRender(#[from] handlebars::RenderError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("provider call timed out after {0:?}")]
    ProviderTimeout(Duration),
    #[error(transparent)]
    Provider(#[from] LLMError),
}

/// Bounds on one agent run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Tool rounds allowed before the transcript is returned as-is.
    pub max_tool_rounds: usize,
    /// Deadline for each provider call.
    pub llm_timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_tool_rounds: 12,
            llm_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct Agent {
    name: String,
    description: Option<String>,
    instructions: String,
    functions: Option<Arc<FunctionRegistry>>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    tool_choice: Option<ToolChoice>,
    model_override: Option<String>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("has_functions", &self.functions.is_some())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("model_override", &self.model_override)
            .finish()
    }
}

impl Agent {
    pub fn from_string(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instructions: instructions.into(),
            functions: None,
            temperature: None,
            max_tokens: None,
            tool_choice: None,
            model_override: None,
        }
    }

    /// Builds an agent whose instructions are a handlebars template rendered against `data`.
    pub fn from_template<T: Serialize>(
        name: impl Into<String>,
        template: &str,
        data: &T,
    ) -> Result<Self, AgentError> {
        let rendered = render_template(template, data)?;

        Ok(Self::from_string(name, rendered))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn model_override(&self) -> Option<&str> {
        self.model_override.as_deref()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_function_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(registry);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    fn request(&self, model: &str, history: &[ChatMessage]) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.instructions.clone()));
        messages.extend(history.iter().cloned());

        let target_model = self.model_override.as_deref().unwrap_or(model);
        let mut request = CompletionRequest::new(target_model.to_string(), messages);

        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        if let Some(functions) = self.functions.as_deref().filter(|f| !f.is_empty()) {
            request = request.with_function_registry(functions);
            if let Some(tool_choice) = &self.tool_choice {
                request = request.with_tool_choice(tool_choice.clone());
            }
        }

        request
    }

    /// Runs the agent on `prompt` until it answers without requesting tools,
    /// recording every exchange as a [`Transcript`].
    ///
    /// Tool failures are fed back to the model as `{"error": ...}` results.
    /// Provider errors and timeouts end the run with an error.
    pub async fn run(
        &self,
        provider: &dyn LLMProvider,
        model: &str,
        prompt: &str,
        limits: RunLimits,
    ) -> Result<Transcript, AgentError> {
        let mut transcript = Transcript::new();
        let mut history = vec![ChatMessage::user(prompt.to_string())];
        transcript.push(Turn::user(prompt));

        let mut tool_rounds = 0usize;

        loop {
            let request = self.request(model, &history);
            let response = match time::timeout(limits.llm_timeout, provider.complete(request)).await {
                Ok(result) => result?,
                Err(_) => return Err(AgentError::ProviderTimeout(limits.llm_timeout)),
            };

            let message = response.message;
            transcript.push(model_turn(&message));

            if message.tool_calls.is_empty() {
                tracing::debug!(agent = %self.name, rounds = tool_rounds, "agent produced final answer");
                break;
            }

            if tool_rounds >= limits.max_tool_rounds {
                tracing::warn!(
                    agent = %self.name,
                    max_tool_rounds = limits.max_tool_rounds,
                    "tool round limit reached; returning transcript as-is"
                );
                break;
            }
            tool_rounds += 1;

            let calls = message.tool_calls.clone();
            history.push(message);

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = self.invoke_tool(call).await;
                let tool_id = call
                    .id
                    .clone()
                    .unwrap_or_else(|| call.function.name.clone());
                history.push(ChatMessage::tool(tool_id, serde_json::to_string(&result)?));
                responses.push(Part::function_response(call.function.name.clone(), result));
            }
            transcript.push(Turn::tool(responses));
        }

        Ok(transcript.stamp())
    }

    async fn invoke_tool(&self, call: &ToolCall) -> Value {
        let name = &call.function.name;
        tracing::debug!(agent = %self.name, tool = %name, "invoking tool");

        let outcome = match &self.functions {
            Some(registry) => registry.invoke(&call.function).await,
            None => Err(LLMError::UnknownFunction(name.clone())),
        };

        match outcome {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(agent = %self.name, tool = %name, %error, "tool call failed");
                json!({ "error": error.to_string() })
            }
        }
    }
}

/// Renders a prompt template. Output is plain text, so HTML escaping is off.
pub fn render_template<T: Serialize>(template: &str, data: &T) -> Result<String, AgentError> {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    Ok(hb.render_template(template, data)?)
}

/// Rejects templates that would fail to parse at render time.
pub fn validate_template(template: &str) -> Result<(), AgentError> {
    let mut hb = Handlebars::new();
    hb.register_template_string("prompt", template)?;
    Ok(())
}

fn model_turn(message: &ChatMessage) -> Turn {
    let mut parts = Vec::with_capacity(message.tool_calls.len() + 1);
    if let Some(text) = message.text().filter(|text| !text.is_empty()) {
        parts.push(Part::text(text));
    }
    for call in &message.tool_calls {
        parts.push(Part::function_call(
            call.function.name.clone(),
            call.function.arguments.clone(),
        ));
    }
    Turn::new(TurnRole::Model, parts)
}

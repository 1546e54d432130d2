use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::LLMError,
    functions::{Tool, ToolChoice},
    providers::LLMProvider,
    types::{ChatMessage, CompletionRequest, CompletionResponse, TokenUsage},
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub referer: Option<String>,
    pub title: Option<String>,
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            referer: None,
            title: Some("sidekick".to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenRouter {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LLMError> {
        Self::from_config(OpenRouterConfig::new(api_key))
    }

    pub fn from_env() -> Result<Self, LLMError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| LLMError::MissingApiKey("OPENROUTER_API_KEY"))?;
        Self::new(api_key)
    }

    pub fn from_config(config: OpenRouterConfig) -> Result<Self, LLMError> {
        if config.api_key.trim().is_empty() {
            return Err(LLMError::MissingApiKey("OPENROUTER_API_KEY"));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn with_default_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.bearer_auth(&self.config.api_key);

        if let Some(ref referer) = self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        if let Some(ref title) = self.config.title {
            builder = builder.header("X-Title", title);
        }

        builder
    }
}

#[derive(Debug, Serialize)]
struct OpenRouterRequestBody {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseBody {
    choices: Vec<OpenRouterChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorBody {
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

#[async_trait]
impl LLMProvider for OpenRouter {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, LLMError> {
        let CompletionRequest {
            model,
            messages,
            max_tokens,
            temperature,
            tools,
            tool_choice,
        } = request;

        let has_tools = !tools.is_empty();
        let body = OpenRouterRequestBody {
            model,
            messages,
            max_tokens,
            temperature,
            tools: if has_tools { Some(tools) } else { None },
            tool_choice: if has_tools { tool_choice } else { None },
        };

        let builder = self
            .with_default_headers(self.client.post(self.endpoint("chat/completions")))
            .json(&body);

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            if let Ok(error_body) = serde_json::from_str::<OpenRouterErrorBody>(&text) {
                if let Some(error) = error_body.error {
                    return Err(LLMError::Provider(error.message));
                }
            }

            return Err(LLMError::Provider(format!(
                "unexpected status {status}: {text}"
            )));
        }

        let parsed: OpenRouterResponseBody = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LLMError::InvalidResponse("response did not contain any choices"))?;

        Ok(CompletionResponse {
            message: choice.message,
            usage: parsed.usage,
        })
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

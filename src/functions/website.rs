use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::LLMError;
use crate::functions::{
    json_schema_for, parse_arguments, FunctionDefinition, FunctionParameter, KernelFunction,
};

#[derive(Debug, Deserialize, JsonSchema)]
struct StatusArgs {
    url: String,
}

/// Liveness probe for a submitted domain. Network failures are reported to
/// the model as data so it can decide, never as a tool error.
#[derive(Debug, Clone)]
pub struct WebsiteStatus {
    client: Client,
}

impl WebsiteStatus {
    pub const NAME: &'static str = "check_website_status";

    pub fn new(timeout: Duration) -> Result<Self, LLMError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let has_scheme = ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    if has_scheme {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[async_trait]
impl KernelFunction for WebsiteStatus {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition::new(Self::NAME)
            .with_description(
                "Fetch a website and report whether it is reachable and which HTTP status it returned.",
            )
            .with_parameter(
                FunctionParameter::new("url", json_schema_for::<String>())
                    .with_description("Domain or URL to check; https:// is assumed when no scheme is given."),
            )
    }

    async fn invoke(&self, arguments: &Value) -> Result<Value, LLMError> {
        let args: StatusArgs = parse_arguments(arguments)?;
        if args.url.trim().is_empty() {
            return Err(LLMError::InvalidFunctionArguments("url must not be empty".into()));
        }
        let url = normalize_url(&args.url);
        tracing::debug!(%url, "checking website status");

        match self.client.get(&url).send().await {
            Ok(response) => Ok(json!({
                "url": url,
                "reachable": true,
                "status_code": response.status().as_u16(),
            })),
            Err(error) => Ok(json!({
                "url": url,
                "reachable": false,
                "error": error.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_missing_scheme() {
        assert_eq!(normalize_url(" team.tech "), "https://team.tech");
        assert_eq!(normalize_url("http://team.tech/home"), "http://team.tech/home");
    }

    #[test]
    fn keeps_scheme_regardless_of_case() {
        assert_eq!(normalize_url("HTTPS://team.tech"), "HTTPS://team.tech");
        assert_eq!(normalize_url("Http://team.tech"), "Http://team.tech");
        assert_eq!(normalize_url("héllo.tech"), "https://héllo.tech");
    }

    #[tokio::test]
    async fn unreachable_host_is_reported_as_data() {
        let tool = WebsiteStatus::new(Duration::from_secs(2)).expect("client");
        let result = tool
            .invoke(&json!({"url": "http://127.0.0.1:1"}))
            .await
            .expect("status is data, not an error");
        assert_eq!(result["reachable"], false);
        assert!(result.get("error").is_some());
    }

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let tool = WebsiteStatus::new(Duration::from_secs(1)).expect("client");
        let error = tool.invoke(&json!({"url": "  "})).await.unwrap_err();
        assert!(matches!(error, LLMError::InvalidFunctionArguments(_)));
    }
}

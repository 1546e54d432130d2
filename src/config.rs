//! Runtime configuration read from the environment.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    agents::RunLimits,
    functions::github::GitHubConfig,
    judge::{AgentGenerator, Judge, PrizeCatalog, PrizeSchemaError, Toolbox},
    providers::openrouter::{OpenRouter, OpenRouterConfig, DEFAULT_BASE_URL},
    LLMError, LLMProvider,
};

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const WEBSITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error(transparent)]
    Prizes(#[from] PrizeSchemaError),
    #[error(transparent)]
    Provider(#[from] LLMError),
}

#[derive(Debug, Clone)]
pub struct SidekickConfig {
    pub openrouter_api_key: Option<String>,
    pub github_token: Option<String>,
    pub model: String,
    pub base_url: String,
    pub bind_addr: SocketAddr,
    pub prizes_file: Option<PathBuf>,
    pub limits: RunLimits,
}

impl Default for SidekickConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            github_token: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            prizes_file: None,
            limits: RunLimits::default(),
        }
    }
}

impl SidekickConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        config.openrouter_api_key = get("OPENROUTER_API_KEY");
        config.github_token = get("GITHUB_TOKEN");
        if let Some(model) = get("SIDEKICK_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = get("OPENROUTER_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(addr) = get("SIDEKICK_ADDR") {
            config.bind_addr = parse_value("SIDEKICK_ADDR", addr)?;
        }
        config.prizes_file = get("SIDEKICK_PRIZES").map(PathBuf::from);
        if let Some(ms) = get("SIDEKICK_LLM_TIMEOUT_MS") {
            config.limits.llm_timeout = Duration::from_millis(parse_value("SIDEKICK_LLM_TIMEOUT_MS", ms)?);
        }
        if let Some(rounds) = get("SIDEKICK_MAX_TOOL_ROUNDS") {
            config.limits.max_tool_rounds = parse_value("SIDEKICK_MAX_TOOL_ROUNDS", rounds)?;
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_prizes_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.prizes_file = Some(path.into());
        self
    }

    /// Built-in prizes, overlaid with `prizes_file` when one is set.
    pub fn load_catalog(&self) -> Result<PrizeCatalog, ConfigError> {
        match &self.prizes_file {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading prize catalog overrides");
                Ok(PrizeCatalog::load_with_overrides(path)?)
            }
            None => Ok(PrizeCatalog::builtin()),
        }
    }

    pub fn provider(&self) -> Result<Arc<dyn LLMProvider>, ConfigError> {
        let api_key = self
            .openrouter_api_key
            .clone()
            .ok_or(LLMError::MissingApiKey("OPENROUTER_API_KEY"))?;
        let config = OpenRouterConfig::new(api_key)
            .with_base_url(self.base_url.clone())
            .with_request_timeout(self.limits.llm_timeout);
        Ok(Arc::new(OpenRouter::from_config(config)?))
    }

    pub fn toolbox(&self) -> Result<Toolbox, ConfigError> {
        if self.github_token.is_none() {
            tracing::warn!("GITHUB_TOKEN is not set; GitHub API calls are unauthenticated and heavily rate limited");
        }
        Ok(Toolbox::new(
            GitHubConfig::new(self.github_token.clone()),
            WEBSITE_TIMEOUT,
        )?)
    }

    /// Wires provider, tools and catalog into a ready [`Judge`].
    pub fn build_judge(&self) -> Result<Judge, ConfigError> {
        let generator = AgentGenerator::new(self.provider()?, self.model.clone()).with_limits(self.limits);
        Ok(Judge::new(
            Arc::new(generator),
            self.load_catalog()?,
            self.toolbox()?,
        ))
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = SidekickConfig::from_lookup(lookup(&[("GITHUB_TOKEN", "  ")])).expect("config");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.github_token, None);
        assert_eq!(config.limits.max_tool_rounds, RunLimits::default().max_tool_rounds);
    }

    #[test]
    fn reads_overrides() {
        let config = SidekickConfig::from_lookup(lookup(&[
            ("SIDEKICK_MODEL", "openai/gpt-4o-mini"),
            ("SIDEKICK_ADDR", "127.0.0.1:9000"),
            ("SIDEKICK_LLM_TIMEOUT_MS", "1500"),
            ("SIDEKICK_MAX_TOOL_ROUNDS", "3"),
            ("SIDEKICK_PRIZES", "prizes.yaml"),
        ]))
        .expect("config");
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.limits.llm_timeout, Duration::from_millis(1500));
        assert_eq!(config.limits.max_tool_rounds, 3);
        assert_eq!(config.prizes_file, Some(PathBuf::from("prizes.yaml")));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let error = SidekickConfig::from_lookup(lookup(&[("SIDEKICK_MAX_TOOL_ROUNDS", "many")])).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue { name: "SIDEKICK_MAX_TOOL_ROUNDS", .. }
        ));
    }

    #[test]
    fn provider_requires_api_key() {
        let error = SidekickConfig::default().provider().err().expect("missing key");
        assert!(matches!(
            error,
            ConfigError::Provider(LLMError::MissingApiKey("OPENROUTER_API_KEY"))
        ));
    }
}

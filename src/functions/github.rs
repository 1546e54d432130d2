use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::LLMError;
use crate::functions::{
    json_schema_for, parse_arguments, DynKernelFunction, FunctionDefinition, FunctionParameter,
    KernelFunction,
};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "sidekick-judge";

static RE_REPO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*
        (?:(?:https?://)?(?:www\.)?github\.com/)?
        (?P<owner>[A-Za-z0-9_.-]+)
        /
        (?P<repo>[A-Za-z0-9_.-]+?)
        (?:\.git)?
        (?:[/?\#].*)?
        \s*$
        ",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
}

impl RepositoryRef {
    /// Accepts `https://github.com/<owner>/<repo>[.git][/...]` and `<owner>/<repo>`.
    pub fn parse(input: &str) -> Option<Self> {
        if input.contains("://") && !input.to_ascii_lowercase().contains("github.com/") {
            return None;
        }
        let caps = RE_REPO_URL.captures(input)?;
        Some(Self {
            owner: caps["owner"].to_string(),
            repo: caps["repo"].to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_base: String,
    pub request_timeout: Duration,
    pub max_file_bytes: usize,
    pub max_entries: usize,
}

impl GitHubConfig {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(20),
            max_file_bytes: 64 * 1024,
            max_entries: 500,
        }
    }
}

#[derive(Debug, Clone)]
struct GitHubClient {
    client: Client,
    config: GitHubConfig,
}

impl GitHubClient {
    fn new(config: GitHubConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, repo: &RepositoryRef, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            repo.owner,
            repo.repo,
            path.trim_start_matches('/')
        )
    }

    fn get(&self, url: &str, accept: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", "2022-11-28");

        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, function: &str, builder: RequestBuilder) -> Result<reqwest::Response, LLMError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match status {
            StatusCode::NOT_FOUND => "repository or path not found".to_string(),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                format!("GitHub refused the request ({status}); rate limited or token lacks access")
            }
            _ => format!("unexpected status {status}: {}", response.text().await?),
        };

        Err(LLMError::FunctionExecution {
            function: function.to_string(),
            message,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListFilesArgs {
    repo_url: String,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FileContentsArgs {
    repo_url: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

fn repository(repo_url: &str) -> Result<RepositoryRef, LLMError> {
    RepositoryRef::parse(repo_url).ok_or_else(|| {
        LLMError::InvalidFunctionArguments(format!("not a GitHub repository URL: {repo_url}"))
    })
}

/// Files of a recursive tree listing, capped at `max_entries` files.
fn tree_listing(repo: &RepositoryRef, tree: TreeResponse, max_entries: usize) -> Value {
    let files: Vec<TreeEntry> = tree
        .tree
        .into_iter()
        .filter(|entry| entry.kind == "blob")
        .collect();
    let truncated = tree.truncated || files.len() > max_entries;

    let entries: Vec<Value> = files
        .into_iter()
        .take(max_entries)
        .map(|entry| json!({ "path": entry.path, "type": "file", "size": entry.size }))
        .collect();

    json!({
        "repository": format!("{}/{}", repo.owner, repo.repo),
        "entries": entries,
        "truncated": truncated,
    })
}

// The contents API answers with an array for directories and an object for files.
fn content_entries(body: Value) -> Result<Vec<ContentEntry>, LLMError> {
    Ok(match body {
        Value::Array(_) => serde_json::from_value(body)?,
        other => vec![serde_json::from_value(other)?],
    })
}

pub struct ListRepositoryFiles {
    client: Arc<GitHubClient>,
}

impl ListRepositoryFiles {
    pub const NAME: &'static str = "list_repository_files";

    async fn list_tree(&self, repo: &RepositoryRef) -> Result<Value, LLMError> {
        let url = self.client.endpoint(repo, "git/trees/HEAD?recursive=1");
        let response = self
            .client
            .send(Self::NAME, self.client.get(&url, "application/vnd.github+json"))
            .await?;
        let tree: TreeResponse = response.json().await?;

        Ok(tree_listing(repo, tree, self.client.config.max_entries))
    }

    async fn list_directory(&self, repo: &RepositoryRef, path: &str) -> Result<Value, LLMError> {
        let url = self.client.endpoint(repo, &format!("contents/{}", path.trim_matches('/')));
        let response = self
            .client
            .send(Self::NAME, self.client.get(&url, "application/vnd.github+json"))
            .await?;

        let entries = content_entries(response.json().await?)?;

        let entries: Vec<Value> = entries
            .into_iter()
            .map(|entry| {
                let kind = if entry.kind == "dir" { "dir" } else { "file" };
                json!({ "name": entry.name, "path": entry.path, "type": kind, "size": entry.size })
            })
            .collect();

        Ok(json!({
            "repository": format!("{}/{}", repo.owner, repo.repo),
            "entries": entries,
            "truncated": false,
        }))
    }
}

#[async_trait]
impl KernelFunction for ListRepositoryFiles {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition::new(Self::NAME)
            .with_description(
                "List files in a GitHub repository. Without a path the whole tree is listed; \
                 with a path only that directory is listed.",
            )
            .with_parameter(
                FunctionParameter::new("repo_url", json_schema_for::<String>())
                    .with_description("Repository URL, e.g. https://github.com/owner/repo."),
            )
            .with_parameter(
                FunctionParameter::new("path", json_schema_for::<String>())
                    .with_description("Directory inside the repository.")
                    .optional(),
            )
    }

    async fn invoke(&self, arguments: &Value) -> Result<Value, LLMError> {
        let args: ListFilesArgs = parse_arguments(arguments)?;
        let repo = repository(&args.repo_url)?;
        tracing::debug!(owner = %repo.owner, repo = %repo.repo, path = ?args.path, "listing repository files");

        match args.path.as_deref().map(str::trim).filter(|path| !path.is_empty() && *path != "/") {
            Some(path) => self.list_directory(&repo, path).await,
            None => self.list_tree(&repo).await,
        }
    }
}

pub struct GetFileContents {
    client: Arc<GitHubClient>,
}

impl GetFileContents {
    pub const NAME: &'static str = "get_file_contents";
}

#[async_trait]
impl KernelFunction for GetFileContents {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition::new(Self::NAME)
            .with_description("Read the text of one file from a GitHub repository.")
            .with_parameter(
                FunctionParameter::new("repo_url", json_schema_for::<String>())
                    .with_description("Repository URL, e.g. https://github.com/owner/repo."),
            )
            .with_parameter(
                FunctionParameter::new("path", json_schema_for::<String>())
                    .with_description("File path relative to the repository root."),
            )
    }

    async fn invoke(&self, arguments: &Value) -> Result<Value, LLMError> {
        let args: FileContentsArgs = parse_arguments(arguments)?;
        let repo = repository(&args.repo_url)?;
        let path = args.path.trim().trim_matches('/');
        if path.is_empty() {
            return Err(LLMError::InvalidFunctionArguments("path must not be empty".into()));
        }
        tracing::debug!(owner = %repo.owner, repo = %repo.repo, path, "reading repository file");

        let url = self.client.endpoint(&repo, &format!("contents/{path}"));
        let response = self
            .client
            .send(Self::NAME, self.client.get(&url, "application/vnd.github.raw"))
            .await?;
        let text = response.text().await?;
        let (content, truncated) = truncate_utf8(&text, self.client.config.max_file_bytes);

        Ok(json!({
            "path": path,
            "content": content,
            "truncated": truncated,
        }))
    }
}

fn truncate_utf8(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

/// Both read-only repository functions, sharing one HTTP client.
pub fn github_functions(config: GitHubConfig) -> Result<Vec<DynKernelFunction>, LLMError> {
    let client = Arc::new(GitHubClient::new(config)?);
    Ok(vec![
        Arc::new(ListRepositoryFiles {
            client: Arc::clone(&client),
        }),
        Arc::new(GetFileContents { client }),
    ])
}

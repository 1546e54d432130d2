use async_trait::async_trait;

use crate::types::{CompletionRequest, CompletionResponse};
use crate::LLMError;

pub mod openrouter;
pub mod scripted;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError>;

    fn name(&self) -> &'static str;
}

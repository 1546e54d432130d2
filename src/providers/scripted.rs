use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    functions::ToolCall,
    providers::LLMProvider,
    types::{ChatMessage, CompletionRequest, CompletionResponse},
    LLMError,
};

/// Replays canned assistant messages in order, one per completion call.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatMessage>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for text in texts {
            provider.push_message(ChatMessage::assistant(text));
        }
        provider
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push_message(ChatMessage::assistant(text));
        self
    }

    pub fn with_tool_calls(self, tool_calls: Vec<ToolCall>) -> Self {
        self.push_message(ChatMessage::assistant_tool_calls(tool_calls));
        self
    }

    pub fn push_message(&self, message: ChatMessage) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(message);
    }

    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match next {
            Some(message) => Ok(CompletionResponse {
                message,
                usage: None,
            }),
            None => Err(LLMError::Provider("no more scripted responses".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

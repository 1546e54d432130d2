pub mod error;
pub mod providers;
pub mod types;
pub mod functions;
pub mod agents;
pub mod transcript;
pub mod verdict;
pub mod judge;
pub mod config;
pub mod server;

pub use error::LLMError;
pub use providers::LLMProvider;
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, MessageRole, TokenUsage};
pub use functions::{
    DynKernelFunction, FunctionCall, FunctionDefinition, FunctionRegistry, KernelFunction, Tool,
    ToolCall, ToolChoice,
};
pub use agents::{Agent, AgentError, RunLimits};
pub use transcript::{Part, Transcript, Turn, TurnRole};
pub use verdict::{reduce, Determination, TranscriptReducer, Verdict};
pub use judge::{
    AgentGenerator, Judge, JudgeError, JudgeOutcome, JudgeTask, PrizeCatalog, PrizeDefinition,
    Submission, SubmissionField, Toolbox, TranscriptGenerator,
};
pub use config::{ConfigError, SidekickConfig};
pub use schemars::JsonSchema;

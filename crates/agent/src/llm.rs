use async_trait::async_trait;
use thiserror::Error;

/// One chat-style completion request: a system instruction, a user message,
/// and an output budget in tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("generation endpoint requires an api key")]
    MissingApiKey,
    #[error("generation transport failed: {0}")]
    Transport(String),
    #[error("generation endpoint returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("generation response was malformed: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

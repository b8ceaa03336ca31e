pub mod llm;
pub mod openai;
pub mod summarizer;

pub use llm::{CompletionRequest, LlmClient, LlmError};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use summarizer::{LinkSummarizer, PromptSet};

use async_trait::async_trait;
use thiserror::Error;

/// Why a single URL could not be summarized. Every variant names the
/// offending URL so the failure can be reported without blocking the
/// message's other URLs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SummarizeError {
    #[error("generation call failed for `{url}`: {detail}")]
    Generation { url: String, detail: String },
    #[error("generation returned an empty completion for `{url}`")]
    EmptyCompletion { url: String },
}

impl SummarizeError {
    pub fn url(&self) -> &str {
        match self {
            Self::Generation { url, .. } | Self::EmptyCompletion { url } => url,
        }
    }
}

/// Produces a short summary for a single URL.
///
/// Implementations do not retry: a failure is reported once and the caller
/// moves on to the next URL in the message.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, url: &str) -> Result<String, SummarizeError>;
}

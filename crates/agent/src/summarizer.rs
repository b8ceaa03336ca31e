use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use linkboard_core::render::TemplateEngine;
use linkboard_core::summarize::{SummarizeError, Summarizer};

use crate::llm::{CompletionRequest, LlmClient};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You summarize web links shared in a team chat channel. \
Be concise and factual: two or three sentences covering what the page is and why it might be \
worth opening. If you cannot access the page, say so plainly instead of guessing.";

pub const DEFAULT_USER_PROMPT_TEMPLATE: &str =
    "Summarize the page at {{ url }}. Keep it short enough to read in a chat thread.";

/// System instruction plus the user instruction template with its single
/// `{{ url }}` substitution point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptSet {
    pub system: String,
    pub user_template: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_template: DEFAULT_USER_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Summarizes one URL through the generation endpoint with a bounded output
/// budget. Failures carry the offending URL and are never retried.
pub struct LinkSummarizer {
    llm: Arc<dyn LlmClient>,
    templates: TemplateEngine,
    system_prompt: String,
    max_output_tokens: u32,
}

impl LinkSummarizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        system_prompt: impl Into<String>,
        templates: TemplateEngine,
        max_output_tokens: u32,
    ) -> Self {
        Self { llm, templates, system_prompt: system_prompt.into(), max_output_tokens }
    }
}

#[async_trait]
impl Summarizer for LinkSummarizer {
    async fn summarize(&self, url: &str) -> Result<String, SummarizeError> {
        let user = self.templates.render_user_prompt(url).map_err(|error| {
            SummarizeError::Generation { url: url.to_owned(), detail: error.to_string() }
        })?;

        let request = CompletionRequest {
            system: self.system_prompt.clone(),
            user,
            max_tokens: self.max_output_tokens,
        };

        debug!(url = %url, max_tokens = self.max_output_tokens, "requesting link summary");
        let completion = self.llm.complete(&request).await.map_err(|error| {
            SummarizeError::Generation { url: url.to_owned(), detail: error.to_string() }
        })?;

        let summary = completion.trim();
        if summary.is_empty() {
            return Err(SummarizeError::EmptyCompletion { url: url.to_owned() });
        }

        Ok(summary.to_owned())
    }
}

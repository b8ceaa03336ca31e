use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::llm::{CompletionRequest, LlmClient, LlmError};

const ERROR_DETAIL_LIMIT: usize = 256;

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout_secs: u64,
}

/// OpenAI-compatible chat-completions client. Failed calls are never retried;
/// classification of the failure is left to the caller.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.expose_secret().trim().to_owned();
        if api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {api_key}");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|error| LlmError::Transport(format!("invalid api key header: {error}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self { client, config })
    }

    fn chat_completions_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(self.chat_completions_url())
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                detail: truncate_detail(&detail),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| LlmError::MalformedResponse(error.to_string()))?;
        extract_completion(&payload)
    }
}

fn extract_completion(payload: &Value) -> Result<String, LlmError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| {
            LlmError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

fn truncate_detail(detail: &str) -> String {
    let trimmed = detail.trim();
    if trimmed.len() <= ERROR_DETAIL_LIMIT {
        return trimmed.to_string();
    }
    let mut cut = ERROR_DETAIL_LIMIT;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::{extract_completion, truncate_detail, OpenAiClient, OpenAiConfig};
    use crate::llm::LlmError;

    fn config(api_base: &str, api_key: &str) -> OpenAiConfig {
        OpenAiConfig {
            api_base: api_base.to_string(),
            api_key: SecretString::from(api_key.to_string()),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn rejects_empty_api_key() {
        let result = OpenAiClient::new(config("https://api.openai.com/v1", "  "));
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn joins_chat_completions_path_onto_base_url() {
        let client = OpenAiClient::new(config("https://api.openai.com/v1/", "sk-test"))
            .expect("client");
        assert_eq!(
            client.chat_completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        let already_full =
            OpenAiClient::new(config("https://proxy.local/v1/chat/completions", "sk-test"))
                .expect("client");
        assert_eq!(
            already_full.chat_completions_url(),
            "https://proxy.local/v1/chat/completions"
        );
    }

    #[test]
    fn extracts_first_choice_content() {
        let payload = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "A summary." } }
            ]
        });

        assert_eq!(extract_completion(&payload).expect("content"), "A summary.");
    }

    #[test]
    fn missing_content_is_a_malformed_response() {
        let payload = json!({ "choices": [] });
        assert!(matches!(
            extract_completion(&payload),
            Err(LlmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let detail = "x".repeat(1000);
        let truncated = truncate_detail(&detail);
        assert!(truncated.chars().count() <= 257);
        assert!(truncated.ends_with('…'));
    }
}

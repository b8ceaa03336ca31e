use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

pub(crate) const SLACK_API_BASE: &str = "https://slack.com/api";

/// Pages fetched from conversations.list before giving up (20 × 1000
/// channels).
const MAX_CHANNEL_PAGES: usize = 20;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack transport failed calling `{method}`: {detail}")]
    Transport { method: &'static str, detail: String },
    #[error("slack api `{method}` returned HTTP {status}")]
    Http { method: &'static str, status: u16 },
    #[error("slack api `{method}` failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("slack api `{method}` response was malformed: {detail}")]
    MalformedResponse { method: &'static str, detail: String },
}

/// One message as resolved through the Web API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRecord {
    pub ts: String,
    pub thread_ts: Option<String>,
    pub user_id: Option<String>,
    pub bot_id: Option<String>,
    pub text: String,
}

impl MessageRecord {
    pub fn is_bot_authored(&self) -> bool {
        self.bot_id.is_some()
    }

    /// Replies carry `thread_ts`; a top-level message roots its own thread.
    pub fn thread_root_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

/// Narrow chat surface the router needs: resolve messages by timestamp and
/// post threaded replies.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// conversations.replies rooted at `ts`. With `limit` 1 this resolves the
    /// single message (or thread root) the timestamp names.
    async fn fetch_replies(
        &self,
        channel_id: &str,
        ts: &str,
        limit: u32,
    ) -> Result<Vec<MessageRecord>, SlackApiError>;

    /// chat.postMessage into the thread rooted at `thread_ts`.
    async fn post_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), SlackApiError>;
}

/// Bot-token Web API client.
#[derive(Clone, Debug)]
pub struct SlackWebClient {
    http: reqwest::Client,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self { http: reqwest::Client::new(), bot_token }
    }

    async fn get(
        &self,
        method: &'static str,
        query: &[(&str, String)],
    ) -> Result<Value, SlackApiError> {
        let url = format!("{SLACK_API_BASE}/{method}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport { method, detail: error.to_string() })?;
        Self::check(method, response).await
    }

    async fn post(&self, method: &'static str, body: Value) -> Result<Value, SlackApiError> {
        let url = format!("{SLACK_API_BASE}/{method}");
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| SlackApiError::Transport { method, detail: error.to_string() })?;
        Self::check(method, response).await
    }

    async fn check(
        method: &'static str,
        response: reqwest::Response,
    ) -> Result<Value, SlackApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Http { method, status: status.as_u16() });
        }

        let payload: Value = response.json().await.map_err(|error| {
            SlackApiError::MalformedResponse { method, detail: error.to_string() }
        })?;

        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_owned();
            return Err(SlackApiError::Api { method, error });
        }

        Ok(payload)
    }

    /// Page through conversations.list until the named channel appears.
    pub async fn find_channel_id(&self, name: &str) -> Result<Option<String>, SlackApiError> {
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_CHANNEL_PAGES {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("limit", "1000".to_string()),
            ];
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }

            let payload = self.get("conversations.list", &query).await?;
            if let Some(id) = channel_id_by_name(&payload, name) {
                return Ok(Some(id));
            }

            cursor = payload["response_metadata"]["next_cursor"]
                .as_str()
                .map(str::trim)
                .filter(|next| !next.is_empty())
                .map(str::to_owned);
            if cursor.is_none() {
                return Ok(None);
            }
        }

        warn!(
            event_name = "slack.api.channel_page_limit",
            channel_name = %name,
            "conversations.list reached page limit; channel list may be incomplete"
        );
        Ok(None)
    }

    pub async fn join_channel(&self, channel_id: &str) -> Result<(), SlackApiError> {
        self.post("conversations.join", json!({ "channel": channel_id })).await?;
        Ok(())
    }

    pub(crate) async fn call_post(
        &self,
        method: &'static str,
        body: Value,
    ) -> Result<Value, SlackApiError> {
        self.post(method, body).await
    }
}

#[async_trait]
impl ChatGateway for SlackWebClient {
    async fn fetch_replies(
        &self,
        channel_id: &str,
        ts: &str,
        limit: u32,
    ) -> Result<Vec<MessageRecord>, SlackApiError> {
        let query = vec![
            ("channel", channel_id.to_string()),
            ("ts", ts.to_string()),
            ("limit", limit.to_string()),
        ];
        let payload = self.get("conversations.replies", &query).await?;

        let messages = payload["messages"].as_array().ok_or_else(|| {
            SlackApiError::MalformedResponse {
                method: "conversations.replies",
                detail: "missing `messages` array".to_string(),
            }
        })?;

        Ok(messages.iter().filter_map(message_from_value).collect())
    }

    async fn post_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        self.post(
            "chat.postMessage",
            json!({ "channel": channel_id, "thread_ts": thread_ts, "text": text }),
        )
        .await?;
        Ok(())
    }
}

fn channel_id_by_name(payload: &Value, name: &str) -> Option<String> {
    payload["channels"].as_array()?.iter().find_map(|channel| {
        let channel_name = channel.get("name").and_then(Value::as_str)?;
        if channel_name != name {
            return None;
        }
        channel.get("id").and_then(Value::as_str).map(str::to_owned)
    })
}

fn message_from_value(value: &Value) -> Option<MessageRecord> {
    let ts = value.get("ts").and_then(Value::as_str)?;
    Some(MessageRecord {
        ts: ts.to_owned(),
        thread_ts: value.get("thread_ts").and_then(Value::as_str).map(str::to_owned),
        user_id: value.get("user").and_then(Value::as_str).map(str::to_owned),
        bot_id: value.get("bot_id").and_then(Value::as_str).map(str::to_owned),
        text: value.get("text").and_then(Value::as_str).unwrap_or_default().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{channel_id_by_name, message_from_value, MessageRecord};

    #[test]
    fn resolves_channel_id_by_exact_name() {
        let payload = json!({
            "ok": true,
            "channels": [
                { "id": "C001", "name": "general" },
                { "id": "C002", "name": "offsite-hackathon-team12" },
            ]
        });

        assert_eq!(
            channel_id_by_name(&payload, "offsite-hackathon-team12").as_deref(),
            Some("C002")
        );
        assert_eq!(channel_id_by_name(&payload, "missing"), None);
    }

    #[test]
    fn parses_message_records_and_skips_entries_without_ts() {
        let message = json!({
            "ts": "1730000000.2000",
            "thread_ts": "1730000000.1000",
            "user": "U1",
            "text": "a reply"
        });
        let record = message_from_value(&message).expect("record");
        assert_eq!(record.thread_root_ts(), "1730000000.1000");
        assert!(!record.is_bot_authored());

        assert_eq!(message_from_value(&json!({ "text": "no ts" })), None);
    }

    #[test]
    fn bot_authored_messages_root_their_own_thread_when_top_level() {
        let record = MessageRecord {
            ts: "1730000000.1000".to_string(),
            thread_ts: None,
            user_id: None,
            bot_id: Some("B1".to_string()),
            text: "summary".to_string(),
        };

        assert!(record.is_bot_authored());
        assert_eq!(record.thread_root_ts(), "1730000000.1000");
    }
}

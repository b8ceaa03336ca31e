use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMsg;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::api::SLACK_API_BASE;
use crate::events::{MessageEvent, ReactionEvent, SlackEnvelope, SlackEvent};
use crate::socket::{SocketTransport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real WebSocket: `apps.connections.open` with the
/// app-level token yields a `wss` URL, envelopes arrive as JSON text frames,
/// and each is acknowledged with its envelope id. A server-initiated
/// `disconnect` frame surfaces as a receive error so the runner's reconnect
/// policy opens a fresh connection.
pub struct WebSocketTransport {
    http: reqwest::Client,
    app_token: SecretString,
    stream: Mutex<Option<WsStream>>,
}

impl WebSocketTransport {
    pub fn new(app_token: SecretString) -> Self {
        Self { http: reqwest::Client::new(), app_token, stream: Mutex::new(None) }
    }

    async fn open_socket_url(&self) -> Result<String, TransportError> {
        let response = self
            .http
            .post(format!("{SLACK_API_BASE}/apps.connections.open"))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Connect(format!(
                "apps.connections.open returned HTTP {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let error = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(TransportError::Connect(format!("apps.connections.open failed: {error}")));
        }

        payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| TransportError::Connect("apps.connections.open returned no url".into()))
    }
}

#[async_trait::async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self.open_socket_url().await?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        info!(event_name = "ingress.slack.socket_opened", "socket mode websocket opened");
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        loop {
            let frame = {
                let mut guard = self.stream.lock().await;
                let Some(stream) = guard.as_mut() else {
                    return Err(TransportError::Receive("transport is not connected".into()));
                };
                stream.next().await
            };

            match frame {
                Some(Ok(WsMsg::Text(text))) => {
                    let value: Value = match serde_json::from_str(&text) {
                        Ok(value) => value,
                        Err(error) => {
                            warn!(error = %error, "discarding unparseable socket frame");
                            continue;
                        }
                    };

                    match value.get("type").and_then(Value::as_str) {
                        Some("hello") => {
                            debug!("socket mode hello received");
                            continue;
                        }
                        Some("disconnect") => {
                            let reason = value
                                .get("reason")
                                .and_then(Value::as_str)
                                .unwrap_or("unspecified");
                            return Err(TransportError::Receive(format!(
                                "server requested disconnect: {reason}"
                            )));
                        }
                        _ => match envelope_from_json(&value) {
                            Some(envelope) => return Ok(Some(envelope)),
                            None => {
                                debug!("discarding socket frame without envelope id");
                                continue;
                            }
                        },
                    }
                }
                Some(Ok(WsMsg::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Acknowledge("transport is not connected".into()));
        };

        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(WsMsg::Text(ack))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            stream
                .close(None)
                .await
                .map_err(|error| TransportError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }
}

/// Socket Mode envelope → typed event model. Frames without an envelope id
/// (hello, disconnect) resolve to `None`; envelope types other than
/// `events_api` still get an envelope so the runner can acknowledge them.
pub(crate) fn envelope_from_json(value: &Value) -> Option<SlackEnvelope> {
    let envelope_id = value.get("envelope_id").and_then(Value::as_str)?.to_owned();

    let event = if value.get("type").and_then(Value::as_str) == Some("events_api") {
        event_from_payload(&value["payload"]["event"])
    } else {
        SlackEvent::Unsupported {
            event_type: value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned(),
        }
    };

    Some(SlackEnvelope { envelope_id, event })
}

pub(crate) fn event_from_payload(event: &Value) -> SlackEvent {
    match event.get("type").and_then(Value::as_str) {
        Some("message") => {
            let subtype = event.get("subtype").and_then(Value::as_str);
            let from_bot = subtype == Some("bot_message") || event.get("bot_id").is_some();
            SlackEvent::Message(MessageEvent {
                channel_id: str_field(event, "channel"),
                ts: str_field(event, "ts"),
                thread_ts: event.get("thread_ts").and_then(Value::as_str).map(str::to_owned),
                user_id: str_field(event, "user"),
                text: str_field(event, "text"),
                from_bot,
            })
        }
        Some("reaction_added") => SlackEvent::ReactionAdded(ReactionEvent {
            channel_id: str_field(&event["item"], "channel"),
            target_ts: str_field(&event["item"], "ts"),
            reaction: str_field(event, "reaction"),
            actor_id: str_field(event, "user"),
        }),
        other => SlackEvent::Unsupported { event_type: other.unwrap_or("unknown").to_owned() },
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
}

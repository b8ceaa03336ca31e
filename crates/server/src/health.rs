use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    channel_joined: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub channel: HealthCheck,
    pub checked_at: String,
}

pub fn router(channel_joined: bool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { channel_joined })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    channel_joined: bool,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(channel_joined)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let channel = channel_check(state.channel_joined);
    let ready = channel.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "linkboard-server runtime initialized".to_string(),
        },
        channel,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn channel_check(channel_joined: bool) -> HealthCheck {
    if channel_joined {
        HealthCheck { status: "ready", detail: "watch channel joined".to_string() }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "no channel joined; message events are ignored".to_string(),
        }
    }
}

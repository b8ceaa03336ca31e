mod bootstrap;
mod health;

use anyhow::Result;
use linkboard_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use linkboard_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.joined_channel_id.is_some(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channel_id = app.joined_channel_id.as_deref().unwrap_or("unjoined"),
        "linkboard-server started; waiting for events"
    );

    tokio::select! {
        result = app.slack_runner.start() => {
            result?;
            tracing::info!(
                event_name = "system.server.socket_ended",
                correlation_id = "shutdown",
                "socket loop ended; waiting for shutdown signal"
            );
            wait_for_shutdown().await?;
        }
        _ = wait_for_shutdown() => {}
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "linkboard-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

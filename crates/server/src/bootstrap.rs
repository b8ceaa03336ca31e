use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use linkboard_agent::llm::LlmError;
use linkboard_agent::openai::{OpenAiClient, OpenAiConfig};
use linkboard_agent::summarizer::{LinkSummarizer, PromptSet};
use linkboard_core::config::{AppConfig, ConfigError, LoadOptions, PromptsConfig};
use linkboard_core::index::ThreadSectionIndex;
use linkboard_core::render::{TemplateEngine, TemplateError};
use linkboard_slack::api::{ChatGateway, SlackWebClient};
use linkboard_slack::canvas::{CanvasAnnotator, CanvasGateway};
use linkboard_slack::events::{EventDispatcher, MessageEventHandler, ReactionEventHandler};
use linkboard_slack::router::{LinkMessageService, ReactionUndoService};
use linkboard_slack::socket::{ReconnectPolicy, SocketModeRunner};
use linkboard_slack::transport::WebSocketTransport;

pub struct Application {
    pub config: AppConfig,
    /// Channel the bot joined at startup; `None` when discovery or join
    /// failed, in which case every message event is ignored.
    pub joined_channel_id: Option<String>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("generation client init failed: {0}")]
    Llm(#[from] LlmError),
    #[error("could not read prompt file `{path}`: {source}")]
    PromptFile { path: PathBuf, source: std::io::Error },
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let web = Arc::new(SlackWebClient::new(config.slack.bot_token.clone()));

    let llm = OpenAiClient::new(OpenAiConfig {
        api_base: config.llm.base_url.clone(),
        api_key: config.llm.api_key.clone(),
        model: config.llm.model.clone(),
        timeout_secs: config.llm.timeout_secs,
    })?;

    let prompts = load_prompts(&config.prompts)?;
    let templates = TemplateEngine::new(&prompts.user_template)?;
    let summarizer = Arc::new(LinkSummarizer::new(
        Arc::new(llm),
        prompts.system,
        templates.clone(),
        config.llm.max_output_tokens,
    ));

    let joined_channel_id =
        join_configured_channel(web.as_ref(), &config.slack.channel_name).await;

    let index = Arc::new(ThreadSectionIndex::new());
    let chat: Arc<dyn ChatGateway> = web.clone();
    let canvas: Arc<dyn CanvasGateway> = web.clone();
    let annotator = CanvasAnnotator::new(canvas, config.canvas.canvas_id.clone());

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageEventHandler::new(LinkMessageService::new(
        joined_channel_id.clone(),
        summarizer,
        chat.clone(),
        annotator.clone(),
        index.clone(),
        templates,
    )));
    dispatcher.register(ReactionEventHandler::new(ReactionUndoService::new(
        chat,
        annotator,
        index,
    )));

    let transport = Arc::new(WebSocketTransport::new(config.slack.app_token.clone()));
    let slack_runner =
        SocketModeRunner::new(transport, Arc::new(dispatcher), ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        channel_id = joined_channel_id.as_deref().unwrap_or("unjoined"),
        "application bootstrap complete"
    );

    Ok(Application { config, joined_channel_id, slack_runner })
}

/// Discover the configured channel and join it. Failures are logged and leave
/// the bot running with no joined channel; they never stop the process.
async fn join_configured_channel(web: &SlackWebClient, channel_name: &str) -> Option<String> {
    let channel_id = match web.find_channel_id(channel_name).await {
        Ok(Some(channel_id)) => channel_id,
        Ok(None) => {
            error!(
                event_name = "system.bootstrap.channel_missing",
                correlation_id = "bootstrap",
                channel_name = %channel_name,
                "configured channel was not found"
            );
            return None;
        }
        Err(err) => {
            error!(
                event_name = "system.bootstrap.channel_discovery_failed",
                correlation_id = "bootstrap",
                channel_name = %channel_name,
                error = %err,
                "channel discovery failed"
            );
            return None;
        }
    };

    if let Err(err) = web.join_channel(&channel_id).await {
        error!(
            event_name = "system.bootstrap.channel_join_failed",
            correlation_id = "bootstrap",
            channel_id = %channel_id,
            error = %err,
            "could not join configured channel"
        );
        return None;
    }

    info!(
        event_name = "system.bootstrap.channel_joined",
        correlation_id = "bootstrap",
        channel_id = %channel_id,
        channel_name = %channel_name,
        "joined configured channel"
    );
    Some(channel_id)
}

/// Embedded prompt defaults, overridable by the files named in config. A
/// configured path that cannot be read is a startup error rather than a
/// silent fallback.
fn load_prompts(config: &PromptsConfig) -> Result<PromptSet, BootstrapError> {
    let mut prompts = PromptSet::default();

    if let Some(path) = &config.system_path {
        prompts.system = read_prompt_file(path)?;
    }
    if let Some(path) = &config.user_path {
        prompts.user_template = read_prompt_file(path)?;
    }

    Ok(prompts)
}

fn read_prompt_file(path: &Path) -> Result<String, BootstrapError> {
    fs::read_to_string(path)
        .map(|raw| raw.trim_end().to_owned())
        .map_err(|source| BootstrapError::PromptFile { path: path.to_path_buf(), source })
}

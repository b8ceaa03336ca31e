use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub llm: LlmConfig,
    pub canvas: CanvasConfig,
    pub prompts: PromptsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
    /// Channel the bot joins at startup and watches for links.
    pub channel_name: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Output budget for one summary, in tokens.
    pub max_output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct CanvasConfig {
    /// Fixed canvas identifier; never discovered at runtime.
    pub canvas_id: String,
}

#[derive(Clone, Debug, Default)]
pub struct PromptsConfig {
    pub system_path: Option<PathBuf>,
    pub user_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub channel_name: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub canvas_id: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                app_token: String::new().into(),
                bot_token: String::new().into(),
                channel_name: "offsite-hackathon-team12".to_string(),
            },
            llm: LlmConfig {
                api_key: String::new().into(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                timeout_secs: 30,
                max_output_tokens: 300,
            },
            canvas: CanvasConfig { canvas_id: "F08UDARNE8H".to_string() },
            prompts: PromptsConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    llm: Option<LlmPatch>,
    canvas: Option<CanvasPatch>,
    prompts: Option<PromptsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
    channel_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CanvasPatch {
    canvas_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PromptsPatch {
    system_path: Option<PathBuf>,
    user_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("linkboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = secret_value(app_token);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(channel_name) = slack.channel_name {
                self.slack.channel_name = channel_name;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = secret_value(api_key);
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
        }

        if let Some(canvas) = patch.canvas {
            if let Some(canvas_id) = canvas.canvas_id {
                self.canvas.canvas_id = canvas_id;
            }
        }

        if let Some(prompts) = patch.prompts {
            if let Some(system_path) = prompts.system_path {
                self.prompts.system_path = Some(system_path);
            }
            if let Some(user_path) = prompts.user_path {
                self.prompts.user_path = Some(user_path);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LINKBOARD_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("LINKBOARD_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("LINKBOARD_SLACK_CHANNEL_NAME") {
            self.slack.channel_name = value;
        }

        if let Some(value) = read_env("LINKBOARD_LLM_API_KEY") {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("LINKBOARD_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("LINKBOARD_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("LINKBOARD_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("LINKBOARD_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LINKBOARD_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("LINKBOARD_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }

        if let Some(value) = read_env("LINKBOARD_CANVAS_ID") {
            self.canvas.canvas_id = value;
        }

        if let Some(value) = read_env("LINKBOARD_PROMPTS_SYSTEM_PATH") {
            self.prompts.system_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("LINKBOARD_PROMPTS_USER_PATH") {
            self.prompts.user_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("LINKBOARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LINKBOARD_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("LINKBOARD_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("LINKBOARD_LOGGING_LEVEL").or_else(|| read_env("LINKBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LINKBOARD_LOGGING_FORMAT").or_else(|| read_env("LINKBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(channel_name) = overrides.channel_name {
            self.slack.channel_name = channel_name;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(llm_api_key);
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(canvas_id) = overrides.canvas_id {
            self.canvas.canvas_id = canvas_id;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_llm(&self.llm)?;
        validate_canvas(&self.canvas)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("linkboard.toml"), PathBuf::from("config/linkboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required (app-level token for Socket Mode)".to_string(),
        ));
    }
    if !app_token.starts_with("xapp-") {
        return Err(ConfigError::Validation(
            "slack.app_token must start with `xapp-`".to_string(),
        ));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required (bot token for Web API calls)".to_string(),
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        return Err(ConfigError::Validation(
            "slack.bot_token must start with `xoxb-`".to_string(),
        ));
    }

    if slack.channel_name.trim().is_empty() {
        return Err(ConfigError::Validation("slack.channel_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.api_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }

    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must be an http(s) URL".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_output_tokens == 0 || llm.max_output_tokens > 4096 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be in range 1..=4096".to_string(),
        ));
    }

    Ok(())
}

fn validate_canvas(canvas: &CanvasConfig) -> Result<(), ConfigError> {
    if canvas.canvas_id.trim().is_empty() {
        return Err(ConfigError::Validation("canvas.canvas_id must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if !LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level must be one of trace|debug|info|warn|error, got `{}`",
            logging.level
        )));
    }
    Ok(())
}

//! Main settings module

use config::{Config, Environment, File};
use counselor_core::Script;
use serde::{Deserialize, Serialize};

use crate::script::resolve_script;
use crate::{ConfigError, VoiceConfig};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Script selection and conversation behavior
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Voice mode tuning
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_observability()?;
        self.validate_conversation()?;
        self.voice.validate()?;
        Ok(())
    }

    fn validate_observability(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        let level = self.observability.log_level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "observability.log_level".to_string(),
                message: format!("Unknown level '{}'", self.observability.log_level),
            });
        }
        Ok(())
    }

    fn validate_conversation(&self) -> Result<(), ConfigError> {
        let conversation = &self.conversation;

        if conversation.user_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "conversation.user_id".to_string(),
                message: "User id cannot be empty".to_string(),
            });
        }

        if conversation.history_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "conversation.history_turns".to_string(),
                message: "Must keep at least one turn of history".to_string(),
            });
        }

        if self.environment.is_production() && conversation.script_path.is_none() {
            tracing::warn!("Running production with a built-in script");
        }

        Ok(())
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Built-in script name (`financial_profile` or `budget`)
    #[serde(default = "default_script")]
    pub script: String,

    /// YAML script file; takes precedence over `script`
    #[serde(default)]
    pub script_path: Option<String>,

    /// Profile owner handed to persistence
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Apply field updates requested by the AI
    #[serde(default = "default_true")]
    pub apply_ai_updates: bool,

    /// Most recent turns included in the prompt
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

fn default_script() -> String {
    "financial_profile".to_string()
}
fn default_user_id() -> String {
    "local".to_string()
}
fn default_true() -> bool {
    true
}
fn default_history_turns() -> usize {
    20
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            script: default_script(),
            script_path: None,
            user_id: default_user_id(),
            apply_ai_updates: true,
            history_turns: default_history_turns(),
        }
    }
}

impl ConversationConfig {
    /// Build the configured script
    pub fn load_script(&self) -> Result<Script, ConfigError> {
        resolve_script(&self.script, self.script_path.as_deref())
    }
}

/// Load settings from files and environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("COUNSELOR")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

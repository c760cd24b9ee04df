//! Configuration management for the counselor
//!
//! Settings are layered from:
//! - `config/default.{yaml,toml,json}`
//! - `config/{environment}.{yaml,toml,json}`
//! - environment variables (`COUNSELOR__` prefix, `__` as section separator)
//!
//! Question scripts are either one of the built-ins or a YAML file, see
//! [`ScriptConfig`].

pub mod script;
pub mod settings;
pub mod voice;

pub use script::{resolve_script, QuestionConfig, ScriptConfig};
pub use settings::{
    load_settings, ConversationConfig, ObservabilityConfig, RuntimeEnvironment, Settings,
};
pub use voice::VoiceConfig;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid script: {0}")]
    Script(#[from] counselor_core::ScriptError),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

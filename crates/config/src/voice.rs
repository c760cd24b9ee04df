//! Voice mode configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Voice session tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Resume listening automatically after playback ends or silence times out
    #[serde(default = "default_true")]
    pub hands_free: bool,

    /// Delay before listening resumes in hands-free mode
    #[serde(default = "default_resume_delay_ms")]
    pub resume_delay_ms: u64,

    /// Delay before the single retry after a network capture error
    #[serde(default = "default_network_retry_delay_ms")]
    pub network_retry_delay_ms: u64,

    /// How many times to ask for synthesis voices before using the default
    #[serde(default = "default_voice_poll_attempts")]
    pub voice_poll_attempts: u32,

    /// Wait between voice list polls
    #[serde(default = "default_voice_poll_interval_ms")]
    pub voice_poll_interval_ms: u64,

    /// Language for capture and preferred synthesis voice
    #[serde(default = "default_language")]
    pub preferred_language: String,

    /// Playback rate (1.0 = normal)
    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,
}

fn default_true() -> bool {
    true
}
fn default_resume_delay_ms() -> u64 {
    400
}
fn default_network_retry_delay_ms() -> u64 {
    1500
}
fn default_voice_poll_attempts() -> u32 {
    10
}
fn default_voice_poll_interval_ms() -> u64 {
    100
}
fn default_language() -> String {
    "es-CO".to_string()
}
fn default_speech_rate() -> f32 {
    1.0
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            hands_free: true,
            resume_delay_ms: default_resume_delay_ms(),
            network_retry_delay_ms: default_network_retry_delay_ms(),
            voice_poll_attempts: default_voice_poll_attempts(),
            voice_poll_interval_ms: default_voice_poll_interval_ms(),
            preferred_language: default_language(),
            speech_rate: default_speech_rate(),
        }
    }
}

impl VoiceConfig {
    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn network_retry_delay(&self) -> Duration {
        Duration::from_millis(self.network_retry_delay_ms)
    }

    pub fn voice_poll_interval(&self) -> Duration {
        Duration::from_millis(self.voice_poll_interval_ms)
    }

    /// Upper bound on the time spent waiting for voices to load
    pub fn voice_poll_budget(&self) -> Duration {
        self.voice_poll_interval() * self.voice_poll_attempts
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resume_delay_ms > 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "voice.resume_delay_ms".to_string(),
                message: format!("Must be at most 10000ms, got {}", self.resume_delay_ms),
            });
        }

        if self.network_retry_delay_ms == 0 || self.network_retry_delay_ms > 30_000 {
            return Err(ConfigError::InvalidValue {
                field: "voice.network_retry_delay_ms".to_string(),
                message: format!(
                    "Must be between 1 and 30000ms, got {}",
                    self.network_retry_delay_ms
                ),
            });
        }

        if self.voice_poll_budget() > Duration::from_secs(5) {
            return Err(ConfigError::InvalidValue {
                field: "voice.voice_poll_attempts".to_string(),
                message: "Voice polling may not exceed 5s in total".to_string(),
            });
        }

        if self.preferred_language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "voice.preferred_language".to_string(),
                message: "Language tag cannot be empty".to_string(),
            });
        }

        if !(0.5..=2.0).contains(&self.speech_rate) {
            return Err(ConfigError::InvalidValue {
                field: "voice.speech_rate".to_string(),
                message: format!("Must be between 0.5 and 2.0, got {}", self.speech_rate),
            });
        }

        Ok(())
    }
}

//! Configuration and settings management
//!
//! Loads settings from environment variables and defines runtime constants.

use crate::personality::{Personality, PersonalityError};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// API key for the OpenAI-compatible chat and image endpoints
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    /// Chat model used by the agent
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Image generation model
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Size of generated images, e.g. `1024x1024`
    #[serde(default = "default_image_size")]
    pub image_size: String,

    /// Personality key (`luna`, `sacha`, `Angèle`)
    #[serde(default = "default_personality")]
    pub personality: String,

    /// Optional API key for the ElevenLabs voice backend
    pub elevenlabs_api_key: Option<String>,
    /// Optional ElevenLabs voice id
    pub elevenlabs_voice_id: Option<String>,

    /// Tavily API key for web search
    pub tavily_api_key: Option<String>,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_personality() -> String {
    "sacha".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use companion_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP_CHAT_MODEL=gpt-4o ./target/app` would set the `chat_model` key
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() maps UPPER_SNAKE_CASE to snake_case,
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Optional keys given as empty strings in config files mean "not set"
        for key in [
            &mut settings.openai_api_key,
            &mut settings.elevenlabs_api_key,
            &mut settings.elevenlabs_voice_id,
            &mut settings.tavily_api_key,
        ] {
            if key.as_deref().is_some_and(str::is_empty) {
                *key = None;
            }
        }

        Ok(settings)
    }

    /// Resolves the configured personality
    ///
    /// # Errors
    ///
    /// Returns `PersonalityError::Unknown` if the key names no known personality.
    pub fn personality(&self) -> Result<Personality, PersonalityError> {
        self.personality.parse()
    }

    /// Whether spoken replies are enabled
    #[must_use]
    pub const fn voice_enabled(&self) -> bool {
        self.elevenlabs_api_key.is_some()
    }

    /// Voice id to use for speech synthesis, falling back to the default voice
    #[must_use]
    pub fn voice_id(&self) -> &str {
        self.elevenlabs_voice_id
            .as_deref()
            .unwrap_or(DEFAULT_VOICE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings: Settings = Config::builder()
            .build()
            .and_then(Config::try_deserialize)
            .expect("empty config must deserialize");

        assert_eq!(settings.chat_model, "gpt-4");
        assert_eq!(settings.openai_api_base, "https://api.openai.com/v1");
        assert_eq!(settings.personality, "sacha");
        assert!(settings.telegram_token.is_empty());
        assert!(!settings.voice_enabled());
        assert_eq!(settings.voice_id(), DEFAULT_VOICE_ID);
    }

    #[test]
    fn test_personality_resolution() {
        let mut settings = Settings {
            personality: "luna".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.personality().ok(), Some(Personality::Luna));

        settings.personality = "nobody".to_string();
        assert!(matches!(
            settings.personality(),
            Err(PersonalityError::Unknown(name)) if name == "nobody"
        ));
    }

    #[test]
    fn test_voice_settings() {
        let settings = Settings {
            elevenlabs_api_key: Some("key".to_string()),
            elevenlabs_voice_id: Some("voice-1".to_string()),
            ..Settings::default()
        };
        assert!(settings.voice_enabled());
        assert_eq!(settings.voice_id(), "voice-1");
    }
}

/// Default ElevenLabs voice ("Rachel")
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Sampling temperature for the chat model
pub const CHAT_TEMPERATURE: f32 = 0.7;
/// Maximum LLM round-trips (tool calls included) per turn
pub const AGENT_MAX_ITERATIONS: usize = 8;
/// Number of history entries sent to the model
pub const HISTORY_LIMIT: usize = 20;
/// Timeout for a single LLM request in seconds
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Upper bound for waiting on a generation backend
pub const GENERATION_TIMEOUT_SECS: u64 = 180;

/// Lifetime of presigned storage URLs
pub const SIGNED_URL_TTL_SECS: u64 = 60 * 60;

/// Greeting sent in response to `/start`
pub const START_GREETING: &str = "New conversation started.";

// Telegram API retry policy
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum Telegram API attempts
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

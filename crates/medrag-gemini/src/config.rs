//! Gemini configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use medrag_core::{Error, Result};

/// Configuration for the Gemini client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub chat_model: String,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub const DEFAULT_API_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_CHAT_MODEL: &'static str = "gemini-1.5-flash";

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration("GOOGLE_API_KEY environment variable not found".to_string())
            })?;

        let api_url = env::var("GEMINI_API_URL")
            .unwrap_or_else(|_| Self::DEFAULT_API_URL.to_string());

        let chat_model = env::var("GEMINI_CHAT_MODEL")
            .unwrap_or_else(|_| Self::DEFAULT_CHAT_MODEL.to_string());

        let timeout_secs = match env::var("GEMINI_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                Error::Configuration(format!("GEMINI_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            Err(_) => 60,
        };

        let config = Self {
            api_key,
            api_url,
            chat_model,
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create configuration with explicit values
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: Self::DEFAULT_API_URL.to_string(),
            chat_model: Self::DEFAULT_CHAT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }

    /// Point the client at a different API root
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url).map_err(|e| {
            Error::Configuration(format!(
                "GEMINI_API_URL is not a valid URL ({}): {}",
                e, self.api_url
            ))
        })?;
        if self.chat_model.trim().is_empty() {
            return Err(Error::Configuration("chat model name is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Configuration(
                "GEMINI_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

//! # Configuration Management
//!
//! Loads application settings from three layers, highest priority last:
//! built-in defaults, an optional `config.toml`, then `APP_`-prefixed
//! environment variables (e.g. `APP_MODEL__IDLE_UNLOAD_SECONDS=600`).
//! `HOST` and `PORT` are honored on top because deployment platforms set
//! them without the prefix.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub landing: LandingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings for the managed speech-to-text model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// HuggingFace repository id of the Whisper model to serve.
    pub name: String,

    /// Seconds of inactivity before the model is evicted from memory.
    /// Zero or negative disables idle eviction.
    pub idle_unload_seconds: i64,

    /// Compute device preference: "auto", "cpu", "cuda" or "metal".
    pub device: String,

    /// Run inference calls one at a time. The candle decoder mutates its
    /// KV caches, so this defaults to true; only disable it for a backend
    /// that is safe to enter concurrently.
    pub serialize_inference: bool,
}

/// Branding shown on the landing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingConfig {
    pub title: String,
    pub tagline: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            model: ModelConfig {
                name: "openai/whisper-base".to_string(),
                idle_unload_seconds: 300,
                device: "auto".to_string(),
                serialize_inference: true,
            },
            landing: LandingConfig {
                title: "RunWhisper".to_string(),
                tagline: "OpenAI compatible transcription server powered by Whisper"
                    .to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        // Deployment platforms set these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Model name cannot be empty"));
        }
        Ok(())
    }
}

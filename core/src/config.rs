//! Configuration management for the tickerscribe pipeline.
//!
//! Handles loading, saving, and providing defaults for the pipeline
//! configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extract::ExtractionMode;
use crate::models::WhisperModel;

/// Main configuration struct for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub extraction: ExtractionConfig,
    pub normalizer: NormalizerConfig,
    pub logging: LoggingConfig,
}

/// Compute device for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

/// Configuration for the transcription model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Whisper model to transcribe with.
    pub transcription: WhisperModel,
    /// Language hint, or "auto" for detection.
    pub language: String,
    /// Compute device for inference.
    pub device: Device,
}

/// Configuration for the extraction backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Default extraction mode: "regex", "llm", or "auto".
    pub mode: ExtractionMode,
    /// LLM model identifier for llm-mode extraction.
    pub llm_model: String,
    /// Base URL of the Ollama-compatible server.
    pub ollama_url: String,
    /// File holding the extraction instruction prompt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
    /// Upper bound on LLM output tokens per extraction call.
    pub max_output_tokens: u32,
}

/// Normalizer policy toggles. The synonym whitelists themselves live in
/// `NormalizerPolicy` and are replaceable through the library API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Flag extractions where price, intraday high and intraday low all
    /// carry the same value.
    pub duplicate_value_guard: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: LogLevel,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing filter directive string for the core crate.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "tickerscribe_core=error",
            LogLevel::Warn => "tickerscribe_core=warn",
            LogLevel::Info => "tickerscribe_core=info",
            LogLevel::Debug => "tickerscribe_core=debug",
            LogLevel::Trace => "tickerscribe_core=trace",
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            transcription: WhisperModel::default(),
            language: "auto".to_string(),
            device: Device::Cpu,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Auto,
            llm_model: "llama3.2".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            prompt_file: None,
            max_output_tokens: 256,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            duplicate_value_guard: true,
        }
    }
}

impl Config {
    /// Returns the default config file path.
    /// `~/.config/tickerscribe/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        crate::dirs::config_dir().map(|p| p.join("config.toml"))
    }

    /// Load configuration from the default path.
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file as TOML")
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

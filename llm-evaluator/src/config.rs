//! Configuration management for the evaluator
//!
//! Loads judge, provider and model settings from TOML files. Secrets are not
//! part of the file: the binary reads them once into [`Credentials`] and
//! hands both to the provider constructors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::registry::ProviderKind;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Extra registry entries keyed by symbolic id
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

/// Which backends grade the subject model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_model")]
    pub model: String,
    /// Used instead of `model` when the subject model is the judge itself
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: default_judge_model(),
            fallback_model: default_fallback_model(),
            temperature: 0.0,
            max_tokens: default_judge_max_tokens(),
        }
    }
}

/// Per-family connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAIConfig,
    #[serde(default)]
    pub bedrock: BedrockConfig,
    #[serde(default)]
    pub watsonx: WatsonxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            base_url: default_openai_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    /// Environment variable holding a Bedrock API key (bearer token)
    #[serde(default = "default_bedrock_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_bedrock_region")]
    pub region: String,
    /// Overrides the regional runtime endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_bedrock_key_env(),
            region: default_bedrock_region(),
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl BedrockConfig {
    /// Runtime endpoint for the configured region
    pub fn endpoint(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatsonxConfig {
    #[serde(default = "default_watsonx_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_watsonx_project_env")]
    pub project_id_env: String,
    #[serde(default = "default_watsonx_url")]
    pub url: String,
    #[serde(default = "default_iam_url")]
    pub iam_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WatsonxConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_watsonx_key_env(),
            project_id_env: default_watsonx_project_env(),
            url: default_watsonx_url(),
            iam_url: default_iam_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// A registry entry declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider: ProviderKind,
    pub model_id: String,
}

// Default value functions
fn default_judge_model() -> String { "llama_3_70b".to_string() }
fn default_fallback_model() -> String { "gpt_4o".to_string() }
fn default_judge_max_tokens() -> u32 { 1024 }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_openai_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_openai_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_bedrock_key_env() -> String { "AWS_BEARER_TOKEN_BEDROCK".to_string() }
fn default_bedrock_region() -> String { "us-east-1".to_string() }
fn default_watsonx_key_env() -> String { "WATSONX_APIKEY".to_string() }
fn default_watsonx_project_env() -> String { "WATSONX_PROJECT_ID".to_string() }
fn default_watsonx_url() -> String { "https://us-south.ml.cloud.ibm.com".to_string() }
fn default_iam_url() -> String { "https://iam.cloud.ibm.com/identity/token".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/evaluator.toml",
            "../config/evaluator.toml",
            "llm-evaluator/config/evaluator.toml",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Secrets and project identifiers, read from the environment once at start-up
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub bedrock_api_key: Option<String>,
    pub watsonx_api_key: Option<String>,
    pub watsonx_project_id: Option<String>,
}

impl Credentials {
    /// Resolve the variables named in `providers` with `lookup`
    pub fn from_lookup<F>(providers: &ProvidersConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: read(&providers.openai.api_key_env),
            bedrock_api_key: read(&providers.bedrock.api_key_env),
            watsonx_api_key: read(&providers.watsonx.api_key_env),
            watsonx_project_id: read(&providers.watsonx.project_id_env),
        }
    }

    /// Resolve from the process environment
    pub fn from_env(providers: &ProvidersConfig) -> Self {
        Self::from_lookup(providers, |name| std::env::var(name).ok())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

//! Provider trait definitions for LLM API clients

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Decoding strategy for providers that take an explicit parameter bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    Greedy,
    Sample,
}

/// Extra generation parameters for completion-style providers that accept a
/// full parameter bundle (watsonx.ai).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationParams {
    pub decoding_method: DecodingMethod,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl TextGenerationParams {
    /// Sampling bundle with the fixed watsonx defaults: min 1 token, top_k 50, top_p 1.
    pub fn sampling(temperature: f32, max_new_tokens: u32) -> Self {
        Self {
            decoding_method: DecodingMethod::Sample,
            max_new_tokens,
            min_new_tokens: 1,
            temperature,
            top_k: 50,
            top_p: 1.0,
        }
    }
}

/// Sampling settings shared by both calling conventions
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub extra: Option<TextGenerationParams>,
}

impl SamplingParams {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: TextGenerationParams) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request itself (bad prompt, parameter out of range).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Whether the failure is local to one call and may be recorded instead
    /// of aborting the evaluation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ProviderError::InvalidArgument(_))
    }

    /// Map a non-success HTTP status and the provider's message onto the error taxonomy.
    pub fn from_status(provider: &str, status: u16, message: String) -> Self {
        match status {
            400 | 422 => ProviderError::InvalidArgument(message),
            401 | 403 => {
                ProviderError::Config(format!("{} auth error ({}): {}", provider, status, message))
            }
            _ => ProviderError::Api { status, message },
        }
    }

    /// Classify a transport failure, reporting client-side timeouts as such.
    pub fn from_transport(error: reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout { timeout_ms }
        } else {
            ProviderError::Http(error)
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The external text generation capability.
///
/// One implementation per provider family. Implementations own their
/// transport, authentication and timeouts, and normalize their response
/// shape down to a single string.
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    /// Provider name (e.g., "openai", "bedrock", "watsonx")
    fn name(&self) -> &str;

    /// Chat-style call: the text of the first response turn
    async fn generate_chat(
        &self,
        model: &str,
        messages: &[Message],
        params: &SamplingParams,
    ) -> ProviderResult<String>;

    /// Completion-style call: the raw generated string
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> ProviderResult<String>;
}

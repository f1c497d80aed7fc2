//! OpenAI API client for chat and legacy completion models

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::traits::{
    Message, ProviderError, ProviderResult, SamplingParams, TextGenerationProvider,
};
use crate::config::OpenAIConfig;

/// OpenAI API client
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    http_client: Client,
    timeout_ms: u64,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, config: &OpenAIConfig) -> ProviderResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
            timeout_ms: config.timeout_ms,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let start = Instant::now();
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, self.timeout_ms))?;

        let status = response.status();
        tracing::debug!("openai {} -> {} in {}ms", path, status, start.elapsed().as_millis());

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60)
                * 1000;

            // OpenAI returns 429 both for rate limits and for an exhausted quota
            let body = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<OpenAIError>(&body) {
                let error_type = error.error.error_type.as_deref().unwrap_or("");
                if error_type == "insufficient_quota"
                    || error.error.message.contains("exceeded your current quota")
                {
                    return Err(ProviderError::Config(format!(
                        "OpenAI quota exceeded: {}",
                        error.error.message
                    )));
                }
            }

            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OpenAIError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };
            return Err(ProviderError::from_status("openai", status.as_u16(), message));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn first_chat_turn(response: ChatResponse) -> ProviderResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))
}

fn first_completion(response: CompletionResponse) -> ProviderResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text)
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))
}

#[async_trait]
impl TextGenerationProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_chat(
        &self,
        model: &str,
        messages: &[Message],
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        let body = ChatRequest {
            model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let response: ChatResponse = self.post("chat/completions", &body).await?;
        first_chat_turn(response)
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        let body = CompletionRequest {
            model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let response: CompletionResponse = self.post("completions", &body).await?;
        first_completion(response)
    }
}

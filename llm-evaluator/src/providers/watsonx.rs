//! IBM watsonx.ai text generation client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::traits::{
    Message, ProviderError, ProviderResult, SamplingParams, TextGenerationParams,
    TextGenerationProvider,
};
use crate::config::WatsonxConfig;

const API_VERSION: &str = "2023-05-29";
/// Refresh the IAM token this long before it actually expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// watsonx.ai client; exchanges the API key for an IAM bearer token on demand
pub struct WatsonxClient {
    api_key: String,
    project_id: String,
    url: String,
    iam_url: String,
    http_client: Client,
    timeout_ms: u64,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl WatsonxClient {
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        config: &WatsonxConfig,
    ) -> ProviderResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            url: config.url.trim_end_matches('/').to_string(),
            iam_url: config.iam_url.clone(),
            http_client,
            timeout_ms: config.timeout_ms,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> ProviderResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http_client
            .post(&self.iam_url)
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Config(format!(
                "watsonx IAM token exchange failed ({}): {}",
                status.as_u16(),
                body
            )));
        }

        let token: IamToken = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: token_expiry(Instant::now(), token.expires_in),
        });
        Ok(access_token)
    }
}

#[derive(Deserialize)]
struct IamToken {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Expiry instant for a token issued at `issued`. Lifetimes past what
/// `Instant` can hold fall back to the default.
fn token_expiry(issued: Instant, expires_in: u64) -> Instant {
    issued
        .checked_add(Duration::from_secs(expires_in))
        .unwrap_or_else(|| issued + Duration::from_secs(default_expires_in()))
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    project_id: &'a str,
    parameters: TextGenerationParams,
}

#[derive(Deserialize)]
struct GenerationResponse {
    results: Vec<GenerationOutput>,
}

#[derive(Deserialize)]
struct GenerationOutput {
    generated_text: String,
}

#[derive(Deserialize)]
struct WatsonxError {
    errors: Vec<WatsonxErrorDetail>,
}

#[derive(Deserialize)]
struct WatsonxErrorDetail {
    message: String,
}

fn generation_request<'a>(
    model: &'a str,
    prompt: &'a str,
    project_id: &'a str,
    params: &SamplingParams,
) -> GenerationRequest<'a> {
    let parameters = params
        .extra
        .clone()
        .unwrap_or_else(|| TextGenerationParams::sampling(params.temperature, params.max_tokens));
    GenerationRequest {
        model_id: model,
        input: prompt,
        project_id,
        parameters,
    }
}

fn generated_text(response: GenerationResponse) -> ProviderResult<String> {
    response
        .results
        .into_iter()
        .next()
        .map(|r| r.generated_text)
        .ok_or_else(|| ProviderError::Parse("No results in generation response".to_string()))
}

#[async_trait]
impl TextGenerationProvider for WatsonxClient {
    fn name(&self) -> &str {
        "watsonx"
    }

    async fn generate_chat(
        &self,
        model: &str,
        _messages: &[Message],
        _params: &SamplingParams,
    ) -> ProviderResult<String> {
        Err(ProviderError::Config(format!(
            "watsonx client only serves text generation (model {})",
            model
        )))
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        let token = self.access_token().await?;
        let body = generation_request(model, prompt, &self.project_id, params);

        let response = self
            .http_client
            .post(format!("{}/ml/v1/text/generation", self.url))
            .query(&[("version", API_VERSION)])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, self.timeout_ms))?;

        let status = response.status();
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_ms: 60_000,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WatsonxError>(&body)
                .ok()
                .and_then(|e| e.errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body));
            return Err(ProviderError::from_status("watsonx", status.as_u16(), message));
        }

        let response: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        generated_text(response)
    }
}

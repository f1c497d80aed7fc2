//! Amazon Bedrock runtime client
//!
//! Chat models go through the Converse API. Completion models go through
//! InvokeModel, whose request and response bodies differ per model family;
//! [`TextFamily`] owns that mapping so callers only ever see a string.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::traits::{
    Message, ProviderError, ProviderResult, SamplingParams, TextGenerationProvider,
};
use crate::config::BedrockConfig;

/// Bedrock runtime client authenticated with a Bedrock API key
pub struct BedrockClient {
    api_key: String,
    endpoint: String,
    http_client: Client,
    timeout_ms: u64,
}

impl BedrockClient {
    pub fn new(api_key: impl Into<String>, config: &BedrockConfig) -> ProviderResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            endpoint: config.endpoint().trim_end_matches('/').to_string(),
            http_client,
            timeout_ms: config.timeout_ms,
        })
    }

    async fn post(&self, model: &str, action: &str, body: &Value) -> ProviderResult<Value> {
        // Versioned model ids carry a ':' that must be escaped in the path
        let url = format!("{}/model/{}/{}", self.endpoint, model.replace(':', "%3A"), action);
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
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
            let message = serde_json::from_str::<BedrockError>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| format!("HTTP {}: {}", status.as_u16(), body));
            return Err(ProviderError::from_status("bedrock", status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct BedrockError {
    #[serde(alias = "Message")]
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<ConverseText>,
    inference_config: InferenceConfig,
}

#[derive(Serialize, Deserialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ConverseContent>,
}

#[derive(Serialize, Deserialize)]
struct ConverseContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct ConverseText {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: Option<ConverseMessage>,
}

fn converse_request(messages: &[Message], params: &SamplingParams) -> ConverseRequest {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for msg in messages {
        if msg.role == "system" {
            system.push(ConverseText {
                text: msg.content.clone(),
            });
        } else {
            turns.push(ConverseMessage {
                role: msg.role.clone(),
                content: vec![ConverseContent {
                    text: Some(msg.content.clone()),
                }],
            });
        }
    }

    ConverseRequest {
        messages: turns,
        system,
        inference_config: InferenceConfig {
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        },
    }
}

fn converse_text(response: ConverseResponse) -> ProviderResult<String> {
    let message = response
        .output
        .message
        .ok_or_else(|| ProviderError::Parse("No message in converse output".to_string()))?;
    message
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| ProviderError::Parse("No text block in converse output".to_string()))
}

/// Model families served through InvokeModel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFamily {
    Meta,
    Titan,
    Anthropic,
    Mistral,
}

impl TextFamily {
    pub fn for_model(model: &str) -> ProviderResult<Self> {
        if model.starts_with("meta.") {
            Ok(TextFamily::Meta)
        } else if model.starts_with("amazon.titan") {
            Ok(TextFamily::Titan)
        } else if model.starts_with("anthropic.") {
            Ok(TextFamily::Anthropic)
        } else if model.starts_with("mistral.") {
            Ok(TextFamily::Mistral)
        } else {
            Err(ProviderError::Config(format!(
                "No Bedrock text completion mapping for model {}",
                model
            )))
        }
    }

    pub fn request_body(&self, prompt: &str, params: &SamplingParams) -> Value {
        match self {
            TextFamily::Meta => json!({
                "prompt": prompt,
                "temperature": params.temperature,
                "max_gen_len": params.max_tokens,
            }),
            TextFamily::Titan => json!({
                "inputText": prompt,
                "textGenerationConfig": {
                    "temperature": params.temperature,
                    "maxTokenCount": params.max_tokens,
                },
            }),
            TextFamily::Anthropic => json!({
                "prompt": format!("\n\nHuman: {}\n\nAssistant:", prompt),
                "temperature": params.temperature,
                "max_tokens_to_sample": params.max_tokens,
            }),
            TextFamily::Mistral => json!({
                "prompt": prompt,
                "temperature": params.temperature,
                "max_tokens": params.max_tokens,
            }),
        }
    }

    pub fn response_text(&self, body: &Value) -> ProviderResult<String> {
        let text = match self {
            TextFamily::Meta => body.get("generation"),
            TextFamily::Titan => body.pointer("/results/0/outputText"),
            TextFamily::Anthropic => body.get("completion"),
            TextFamily::Mistral => body.pointer("/outputs/0/text"),
        };
        text.and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Parse(format!("Unexpected {:?} response shape", self)))
    }
}

#[async_trait]
impl TextGenerationProvider for BedrockClient {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn generate_chat(
        &self,
        model: &str,
        messages: &[Message],
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        let body = serde_json::to_value(converse_request(messages, params))
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let value = self.post(model, "converse", &body).await?;
        let response: ConverseResponse =
            serde_json::from_value(value).map_err(|e| ProviderError::Parse(e.to_string()))?;
        converse_text(response)
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        let family = TextFamily::for_model(model)?;
        let value = self
            .post(model, "invoke", &family.request_body(prompt, params))
            .await?;
        family.response_text(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_detection() {
        assert_eq!(TextFamily::for_model("meta.llama3-8b-instruct-v1:0").unwrap(), TextFamily::Meta);
        assert_eq!(TextFamily::for_model("amazon.titan-text-express-v1").unwrap(), TextFamily::Titan);
        assert_eq!(TextFamily::for_model("anthropic.claude-v2").unwrap(), TextFamily::Anthropic);
        assert!(matches!(
            TextFamily::for_model("cohere.command-text-v14"),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn test_titan_body_and_response() {
        let params = SamplingParams::new(0.5, 100);
        let body = TextFamily::Titan.request_body("Write a poem", &params);
        assert_eq!(body["inputText"], "Write a poem");
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], 100);

        let response = json!({"results": [{"outputText": "Waves", "tokenCount": 1}]});
        assert_eq!(TextFamily::Titan.response_text(&response).unwrap(), "Waves");
    }

    #[test]
    fn test_meta_body_and_response() {
        let body = TextFamily::Meta.request_body("Hi", &SamplingParams::new(0.2, 64));
        assert_eq!(body["max_gen_len"], 64);
        let response = json!({"generation": " Hello there", "stop_reason": "stop"});
        assert_eq!(TextFamily::Meta.response_text(&response).unwrap(), " Hello there");
    }

    #[test]
    fn test_anthropic_text_prompt_is_wrapped() {
        let body = TextFamily::Anthropic.request_body("Hi", &SamplingParams::new(0.2, 64));
        assert_eq!(body["prompt"], "\n\nHuman: Hi\n\nAssistant:");
        assert_eq!(body["max_tokens_to_sample"], 64);
    }

    #[test]
    fn test_unexpected_shape_is_parse_error() {
        let response = json!({"outputs": []});
        assert!(matches!(
            TextFamily::Mistral.response_text(&response),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_converse_request_splits_system_messages() {
        let messages = vec![Message::system("Be fair."), Message::user("Grade this")];
        let request = converse_request(&messages, &SamplingParams::new(0.0, 1024));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"][0]["text"], "Be fair.");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["text"], "Grade this");
        assert_eq!(json["inferenceConfig"]["maxTokens"], 1024);
    }

    #[test]
    fn test_converse_first_text_block() {
        let response: ConverseResponse = serde_json::from_value(json!({
            "output": {"message": {"role": "assistant", "content": [{"text": "Rating: [[8]]"}]}},
            "stopReason": "end_turn"
        }))
        .unwrap();
        assert_eq!(converse_text(response).unwrap(), "Rating: [[8]]");
    }
}

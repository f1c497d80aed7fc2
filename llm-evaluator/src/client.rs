//! Generation client: one resolved backend behind a uniform call

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::providers::{
    Message, ProviderError, ProviderResult, ProviderSet, SamplingParams, TextGenerationParams,
    TextGenerationProvider,
};
use crate::registry::{InvocationStyle, ModelSpec, ProviderKind};

/// One generation call's inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_new_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_new_tokens,
        }
    }

    /// Provider parameters for a backend kind
    pub fn sampling_params(&self, provider: ProviderKind) -> SamplingParams {
        let params = SamplingParams::new(self.temperature, self.max_new_tokens);
        match provider {
            ProviderKind::WatsonxText => params.with_extra(TextGenerationParams::sampling(
                self.temperature,
                self.max_new_tokens,
            )),
            _ => params,
        }
    }
}

/// Either generated text or the provider's rejection message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Text(String),
    Rejected(String),
}

impl GenerationResult {
    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationResult::Text(text) => Some(text),
            GenerationResult::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, GenerationResult::Rejected(_))
    }
}

/// A backend bound to its provider client
#[derive(Clone)]
pub struct GenerationClient {
    spec: ModelSpec,
    provider: Arc<dyn TextGenerationProvider>,
}

impl GenerationClient {
    pub fn new(spec: ModelSpec, provider: Arc<dyn TextGenerationProvider>) -> Self {
        Self { spec, provider }
    }

    /// Bind a spec to the client serving its provider family
    pub fn from_providers(spec: ModelSpec, providers: &ProviderSet) -> ProviderResult<Self> {
        let provider = providers.get(spec.provider.family())?;
        Ok(Self::new(spec, provider))
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Generate text for a single user prompt.
    ///
    /// Invalid-argument rejections come back as [`GenerationResult::Rejected`];
    /// every other provider failure is returned as an error.
    pub async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResult> {
        self.generate_with_system(None, request).await
    }

    /// Like [`generate`](Self::generate), with an optional system message for chat backends.
    /// Completion backends receive the user prompt alone.
    pub async fn generate_with_system(
        &self,
        system: Option<&str>,
        request: &GenerationRequest,
    ) -> ProviderResult<GenerationResult> {
        let params = request.sampling_params(self.spec.provider);
        let model = self.spec.provider_model_id.as_str();

        let outcome = match self.spec.provider.style() {
            InvocationStyle::Chat => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = system {
                    messages.push(Message::system(system));
                }
                messages.push(Message::user(&request.prompt));
                tracing::debug!("Sending messages to {}: {:?}", self.spec.symbolic_id, messages);
                self.provider.generate_chat(model, &messages, &params).await
            }
            InvocationStyle::Text => {
                tracing::debug!("Sending prompt to {}: {}", self.spec.symbolic_id, request.prompt);
                self.provider.generate_text(model, &request.prompt, &params).await
            }
        };

        match outcome {
            Ok(text) => {
                tracing::debug!("Received from {}: {}", self.spec.symbolic_id, text);
                Ok(GenerationResult::Text(text))
            }
            Err(ProviderError::InvalidArgument(message)) => {
                tracing::warn!("{} rejected the request: {}", self.spec.symbolic_id, message);
                Ok(GenerationResult::Rejected(message))
            }
            Err(e) => Err(e),
        }
    }
}

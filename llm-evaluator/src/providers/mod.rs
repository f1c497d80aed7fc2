//! LLM provider implementations

pub mod bedrock;
pub mod openai;
pub mod traits;
pub mod watsonx;

#[cfg(test)]
pub(crate) mod testing;

pub use bedrock::BedrockClient;
pub use openai::OpenAIClient;
pub use traits::{
    DecodingMethod, Message, ProviderError, ProviderResult, SamplingParams, TextGenerationParams,
    TextGenerationProvider,
};
pub use watsonx::WatsonxClient;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Credentials, ProvidersConfig};
use crate::registry::ProviderFamily;

/// One client per provider family, shared by every evaluation
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<ProviderFamily, Arc<dyn TextGenerationProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the client for a family
    pub fn with(mut self, family: ProviderFamily, provider: Arc<dyn TextGenerationProvider>) -> Self {
        self.providers.insert(family, provider);
        self
    }

    /// Build every family whose credentials are present
    pub fn from_config(config: &ProvidersConfig, credentials: &Credentials) -> ProviderResult<Self> {
        let mut set = Self::new();

        if let Some(key) = &credentials.openai_api_key {
            set = set.with(ProviderFamily::OpenAI, Arc::new(OpenAIClient::new(key, &config.openai)?));
        }

        if let Some(key) = &credentials.bedrock_api_key {
            set = set.with(ProviderFamily::Bedrock, Arc::new(BedrockClient::new(key, &config.bedrock)?));
        }

        match (&credentials.watsonx_api_key, &credentials.watsonx_project_id) {
            (Some(key), Some(project)) => {
                set = set.with(
                    ProviderFamily::Watsonx,
                    Arc::new(WatsonxClient::new(key, project, &config.watsonx)?),
                );
            }
            (Some(_), None) => {
                tracing::warn!(
                    "watsonx API key set but {} is missing; watsonx models unavailable",
                    config.watsonx.project_id_env
                );
            }
            _ => {}
        }

        Ok(set)
    }

    /// The client for a family. A family without credentials is a
    /// configuration error, which is fatal for the evaluation.
    pub fn get(&self, family: ProviderFamily) -> ProviderResult<Arc<dyn TextGenerationProvider>> {
        self.providers.get(&family).cloned().ok_or_else(|| {
            ProviderError::Config(format!("No credentials configured for {} provider", family))
        })
    }

    pub fn families(&self) -> Vec<ProviderFamily> {
        self.providers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

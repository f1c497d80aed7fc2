//! Backend registry: symbolic model ids to provider configurations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ModelEntry;

/// Provider backend and calling convention, decided once at resolution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "openai_chat")]
    OpenAIChat,
    #[serde(rename = "openai_text")]
    OpenAIText,
    BedrockChat,
    BedrockText,
    WatsonxText,
}

/// How a backend is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStyle {
    /// A single user message in, the first response turn out
    Chat,
    /// The raw prompt string in, the raw generated string out
    Text,
}

/// The client family that serves a provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    OpenAI,
    Bedrock,
    Watsonx,
}

impl ProviderKind {
    pub fn style(&self) -> InvocationStyle {
        match self {
            ProviderKind::OpenAIChat | ProviderKind::BedrockChat => InvocationStyle::Chat,
            ProviderKind::OpenAIText | ProviderKind::BedrockText | ProviderKind::WatsonxText => {
                InvocationStyle::Text
            }
        }
    }

    pub fn family(&self) -> ProviderFamily {
        match self {
            ProviderKind::OpenAIChat | ProviderKind::OpenAIText => ProviderFamily::OpenAI,
            ProviderKind::BedrockChat | ProviderKind::BedrockText => ProviderFamily::Bedrock,
            ProviderKind::WatsonxText => ProviderFamily::Watsonx,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAIChat => "openai_chat",
            ProviderKind::OpenAIText => "openai_text",
            ProviderKind::BedrockChat => "bedrock_chat",
            ProviderKind::BedrockText => "bedrock_text",
            ProviderKind::WatsonxText => "watsonx_text",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderFamily::OpenAI => "openai",
            ProviderFamily::Bedrock => "bedrock",
            ProviderFamily::Watsonx => "watsonx",
        };
        write!(f, "{}", name)
    }
}

/// A resolved backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub symbolic_id: String,
    pub provider: ProviderKind,
    pub provider_model_id: String,
}

/// Provider for ids the registry does not know
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::OpenAIText;
/// Model served for ids the registry does not know
pub const DEFAULT_MODEL_ID: &str = "gpt-3.5-turbo-instruct";

const BUILTIN_MODELS: &[(&str, ProviderKind, &str)] = &[
    ("gpt_3.5", ProviderKind::OpenAIChat, "gpt-3.5-turbo-0125"),
    ("gpt_4", ProviderKind::OpenAIChat, "gpt-4-turbo"),
    ("gpt_4o", ProviderKind::OpenAIChat, "gpt-4o"),
    ("llama_3_8b", ProviderKind::BedrockText, "meta.llama3-8b-instruct-v1:0"),
    ("llama_3_70b", ProviderKind::BedrockChat, "meta.llama3-70b-instruct-v1:0"),
    ("claude_3_sonnet", ProviderKind::BedrockChat, "anthropic.claude-3-sonnet-20240229-v1:0"),
    ("claude_3_haiku", ProviderKind::BedrockChat, "anthropic.claude-3-haiku-20240307-v1:0"),
    ("claude_3_opus", ProviderKind::BedrockChat, "anthropic.claude-3-opus-20240229-v1:0"),
    ("claude_v2.1_200k", ProviderKind::BedrockChat, "anthropic.claude-v2"),
    ("amazon_titan_text_g1", ProviderKind::BedrockText, "amazon.titan-text-express-v1"),
    ("granite_13b_chat", ProviderKind::WatsonxText, "ibm/granite-13b-chat-v2"),
    ("granite_13b_instruct", ProviderKind::WatsonxText, "ibm/granite-13b-instruct-v2"),
    ("mixtral_8x7b", ProviderKind::WatsonxText, "mistralai/mixtral-8x7b-instruct-v01"),
];

/// Lookup table from symbolic id to backend. Read-only once built.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: BTreeMap<String, (ProviderKind, String)>,
}

impl Registry {
    /// The built-in model table
    pub fn builtin() -> Self {
        let entries = BUILTIN_MODELS
            .iter()
            .map(|(id, kind, model)| (id.to_string(), (*kind, model.to_string())))
            .collect();
        Self { entries }
    }

    /// The built-in table with configured entries layered on top
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a ModelEntry)>,
    {
        let mut registry = Self::builtin();
        for (id, entry) in overrides {
            registry
                .entries
                .insert(id.clone(), (entry.provider, entry.model_id.clone()));
        }
        registry
    }

    /// Resolve a symbolic id. Unknown ids fall back to the default
    /// completion model; this never fails.
    pub fn resolve(&self, symbolic_id: &str) -> ModelSpec {
        match self.entries.get(symbolic_id) {
            Some((provider, model)) => ModelSpec {
                symbolic_id: symbolic_id.to_string(),
                provider: *provider,
                provider_model_id: model.clone(),
            },
            None => {
                tracing::debug!(
                    "Unknown model id {:?}, using default {} ({})",
                    symbolic_id,
                    DEFAULT_MODEL_ID,
                    DEFAULT_PROVIDER
                );
                ModelSpec {
                    symbolic_id: symbolic_id.to_string(),
                    provider: DEFAULT_PROVIDER,
                    provider_model_id: DEFAULT_MODEL_ID.to_string(),
                }
            }
        }
    }

    pub fn contains(&self, symbolic_id: &str) -> bool {
        self.entries.contains_key(symbolic_id)
    }

    /// All known entries, ordered by symbolic id
    pub fn specs(&self) -> Vec<ModelSpec> {
        self.entries
            .keys()
            .map(|id| self.resolve(id))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Resolve against the built-in table
pub fn resolve(symbolic_id: &str) -> ModelSpec {
    Registry::builtin().resolve(symbolic_id)
}

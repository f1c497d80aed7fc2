//! Scripted provider for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::traits::{
    Message, ProviderError, ProviderResult, SamplingParams, TextGenerationProvider,
};

/// A call observed by [`ScriptedProvider`]
#[derive(Debug, Clone)]
pub enum Call {
    Chat {
        model: String,
        messages: Vec<Message>,
        params: SamplingParams,
    },
    Text {
        model: String,
        prompt: String,
        params: SamplingParams,
    },
}

impl Call {
    pub fn model(&self) -> &str {
        match self {
            Call::Chat { model, .. } | Call::Text { model, .. } => model,
        }
    }

    /// The prompt text, or the last message for chat calls
    pub fn prompt(&self) -> &str {
        match self {
            Call::Chat { messages, .. } => messages.last().map(|m| m.content.as_str()).unwrap_or(""),
            Call::Text { prompt, .. } => prompt,
        }
    }
}

/// Replays queued replies in order and records every call.
/// Once the script runs dry it answers with `fallback`.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<ProviderResult<String>>>,
    calls: Mutex<Vec<Call>>,
    fallback: String,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            fallback: "Rating: [[5]]".to_string(),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, error: ProviderError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, call: Call) -> ProviderResult<String> {
        self.calls.lock().unwrap().push(call);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[async_trait]
impl TextGenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_chat(
        &self,
        model: &str,
        messages: &[Message],
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        self.next(Call::Chat {
            model: model.to_string(),
            messages: messages.to_vec(),
            params: params.clone(),
        })
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> ProviderResult<String> {
        self.next(Call::Text {
            model: model.to_string(),
            prompt: prompt.to_string(),
            params: params.clone(),
        })
    }
}

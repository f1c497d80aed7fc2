//! Judge client: scores predictions and writes the final verdict

use std::collections::BTreeMap;

use crate::client::{GenerationClient, GenerationRequest, GenerationResult};
use crate::config::JudgeConfig;
use crate::providers::{ProviderError, ProviderResult, ProviderSet};
use crate::registry::{InvocationStyle, ModelSpec, Registry};

const JUDGE_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// The caller's rubric. The judge sees it as a one-entry mapping under `accuracy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationCriteria {
    pub accuracy_description: String,
}

impl EvaluationCriteria {
    pub fn new(accuracy_description: impl Into<String>) -> Self {
        Self {
            accuracy_description: accuracy_description.into(),
        }
    }

    pub fn as_mapping(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([("accuracy", self.accuracy_description.as_str())])
    }

    fn render(&self) -> String {
        let lines: Vec<String> = self
            .as_mapping()
            .into_iter()
            .map(|(name, description)| format!("{}: {}", name, description))
            .collect();
        format!(
            "For this evaluation, you should primarily consider the following criteria:\n{}\n",
            lines.join("\n")
        )
    }
}

/// Pick the judge backend for a subject model. The fallback is used only
/// when the subject's symbolic id is exactly the judge's.
///
/// The judge must be a registered chat backend; anything else is a
/// configuration error.
pub fn select_judge(
    registry: &Registry,
    subject_id: &str,
    config: &JudgeConfig,
) -> ProviderResult<ModelSpec> {
    let judge_id = if subject_id == config.model {
        tracing::info!(
            "Subject model {} is the judge; grading with {} instead",
            subject_id,
            config.fallback_model
        );
        &config.fallback_model
    } else {
        &config.model
    };

    if !registry.contains(judge_id) {
        return Err(ProviderError::Config(format!(
            "Judge model {} is not a known model id",
            judge_id
        )));
    }

    let spec = registry.resolve(judge_id);
    if spec.provider.style() != InvocationStyle::Chat {
        return Err(ProviderError::Config(format!(
            "Judge model {} uses {}, which is not a chat backend",
            judge_id, spec.provider
        )));
    }
    Ok(spec)
}

/// Build the scoring instruction for one prediction
pub fn scoring_prompt(
    criteria: &EvaluationCriteria,
    prediction: &str,
    input: &str,
    reference: &str,
) -> String {
    format!(
        "[Instruction]\nPlease act as an impartial judge and evaluate the quality of the response \
         provided by an AI assistant to the user question displayed below. {criteria}\
         [Ground truth]\n{reference}\n\
         Begin your evaluation by providing a short explanation. Be as objective as possible. \
         After providing your explanation, you must rate the response on a scale of 1 to 10 by \
         strictly following this format: \"[[rating]]\", for example: \"Rating: [[5]]\".\n\n\
         [Question]\n{input}\n\n\
         [The Start of Assistant's Answer]\n{prediction}\n[The End of Assistant's Answer]",
        criteria = criteria.render(),
        reference = reference,
        input = input,
        prediction = prediction,
    )
}

/// Build the final verdict instruction
pub fn verdict_prompt(subject_id: &str, iterations: u32) -> String {
    format!(
        "Final verdict for the evaluation of {} based on the given criteria and {} iterations:",
        subject_id, iterations
    )
}

/// The scoring oracle for one evaluation
pub struct JudgeClient {
    client: GenerationClient,
    criteria: EvaluationCriteria,
    temperature: f32,
    max_tokens: u32,
}

impl JudgeClient {
    pub fn new(client: GenerationClient, criteria: EvaluationCriteria, config: &JudgeConfig) -> Self {
        Self {
            client,
            criteria,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve the judge for `subject_id` and bind it to its provider
    pub fn for_subject(
        registry: &Registry,
        providers: &ProviderSet,
        subject_id: &str,
        criteria: EvaluationCriteria,
        config: &JudgeConfig,
    ) -> ProviderResult<Self> {
        let spec = select_judge(registry, subject_id, config)?;
        let client = GenerationClient::from_providers(spec, providers)?;
        Ok(Self::new(client, criteria, config))
    }

    pub fn spec(&self) -> &ModelSpec {
        self.client.spec()
    }

    /// Ask the judge to grade `prediction`. The rationale comes back verbatim.
    pub async fn score(
        &self,
        prediction: &str,
        input: &str,
        reference: &str,
    ) -> ProviderResult<GenerationResult> {
        let prompt = scoring_prompt(&self.criteria, prediction, input, reference);
        let request = GenerationRequest::new(prompt, self.temperature, self.max_tokens);
        self.client
            .generate_with_system(Some(JUDGE_SYSTEM_PROMPT), &request)
            .await
    }

    pub async fn final_verdict(
        &self,
        subject_id: &str,
        iterations: u32,
    ) -> ProviderResult<GenerationResult> {
        let request = GenerationRequest::new(
            verdict_prompt(subject_id, iterations),
            self.temperature,
            self.max_tokens,
        );
        self.client.generate(&request).await
    }
}

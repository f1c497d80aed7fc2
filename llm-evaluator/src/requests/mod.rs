//! Evaluation requests and their validation

pub mod loader;

pub use loader::{load_requests_from_csv, load_requests_from_file, load_requests_from_json, LoadError};

use serde::{Deserialize, Serialize};

use crate::client::GenerationRequest;
use crate::judge::EvaluationCriteria;

/// A validated evaluation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub model: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
    pub prompt: String,
    pub criteria: String,
    pub iterations: u32,
    pub expected_result: String,
}

impl EvaluationRequest {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        criteria: impl Into<String>,
        expected_result: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            temperature: 0.5,
            max_new_tokens: 1024,
            prompt: prompt.into(),
            criteria: criteria.into(),
            iterations: 1,
            expected_result: expected_result.into(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// The subject model's per-iteration call
    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest::new(&self.prompt, self.temperature, self.max_new_tokens)
    }

    pub fn evaluation_criteria(&self) -> EvaluationCriteria {
        EvaluationCriteria::new(&self.criteria)
    }

    /// Check ranges on an already-complete request
    pub fn validate(&self) -> Result<(), RequestError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RequestError::InvalidField {
                field: "temperature",
                reason: format!("{} is outside [0, 1]", self.temperature),
            });
        }
        if self.max_new_tokens == 0 {
            return Err(RequestError::InvalidField {
                field: "max_new_tokens",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Caller input before validation; every field may be missing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvaluationRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub criteria: Option<String>,
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub expected_result: Option<String>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, RequestError> {
    value.ok_or(RequestError::MissingField(field))
}

impl RawEvaluationRequest {
    /// Reject the first missing field, then check ranges
    pub fn validate(self) -> Result<EvaluationRequest, RequestError> {
        let request = EvaluationRequest {
            model: required(self.model, "model")?,
            temperature: required(self.temperature, "temperature")?,
            max_new_tokens: required(self.max_new_tokens, "max_new_tokens")?,
            prompt: required(self.prompt, "prompt")?,
            criteria: required(self.criteria, "criteria")?,
            iterations: required(self.iterations, "iterations")?,
            expected_result: required(self.expected_result, "expected_result")?,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Client-side request errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

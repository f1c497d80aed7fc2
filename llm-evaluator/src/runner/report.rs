//! Per-iteration records and the evaluation report

use serde::{Deserialize, Serialize};

use crate::scoring::average_score;

/// Outcome of one generate-then-score round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based submission order
    #[serde(rename = "iteration")]
    pub iteration_number: u32,
    pub prediction: Option<String>,
    pub score: Option<u32>,
    /// Judge rationale, or the error message for a failed round
    #[serde(rename = "reason")]
    pub rationale: String,
}

impl IterationRecord {
    /// A round whose prediction reached the judge. `score` is absent when
    /// the rationale carried no marker.
    pub fn scored(
        iteration_number: u32,
        prediction: String,
        score: Option<u32>,
        rationale: String,
    ) -> Self {
        Self {
            iteration_number,
            prediction: Some(prediction),
            score,
            rationale,
        }
    }

    /// A round lost to a provider rejection
    pub fn failed(iteration_number: u32, message: String) -> Self {
        Self {
            iteration_number,
            prediction: None,
            score: None,
            rationale: message,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.prediction.is_none()
    }
}

/// Everything one evaluation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    #[serde(rename = "eval_results")]
    pub records: Vec<IterationRecord>,
    #[serde(rename = "avg_score")]
    pub average_score: Option<f64>,
    pub final_verdict: String,
    #[serde(rename = "temperature")]
    pub temperature_echo: f32,
}

impl EvaluationReport {
    pub fn new(records: Vec<IterationRecord>, final_verdict: String, temperature: f32) -> Self {
        let average_score = average_score(records.iter().map(|r| r.score));
        Self {
            records,
            average_score,
            final_verdict,
            temperature_echo: temperature,
        }
    }

    pub fn scored_count(&self) -> usize {
        self.records.iter().filter(|r| r.score.is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_failed()).count()
    }
}

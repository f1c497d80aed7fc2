//! Evaluation orchestrator: generate, score, aggregate, verdict

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::progress::{NoOpProgress, ProgressCallback};
use super::report::{EvaluationReport, IterationRecord};
use crate::client::{GenerationClient, GenerationResult};
use crate::config::{Config, Credentials, JudgeConfig};
use crate::judge::{select_judge, JudgeClient};
use crate::providers::{ProviderError, ProviderResult, ProviderSet};
use crate::registry::{ModelSpec, Registry};
use crate::requests::EvaluationRequest;
use crate::scoring::extract_score;

/// Errors that end an evaluation without a report
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Evaluation cancelled after {completed} iterations")]
    Cancelled { completed: usize },
}

/// One row of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub model: String,
    #[serde(flatten)]
    pub report: Option<EvaluationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs evaluations against a fixed registry and provider set.
///
/// Holds no per-request state; concurrent `run` calls are independent.
#[derive(Clone)]
pub struct Evaluator {
    registry: Arc<Registry>,
    providers: ProviderSet,
    judge: JudgeConfig,
}

impl Evaluator {
    pub fn new(registry: Registry, providers: ProviderSet, judge: JudgeConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            providers,
            judge,
        }
    }

    /// Build the registry and provider clients from configuration
    pub fn from_config(config: &Config, credentials: &Credentials) -> ProviderResult<Self> {
        let registry = Registry::with_overrides(&config.models);
        let providers = ProviderSet::from_config(&config.providers, credentials)?;
        Ok(Self::new(registry, providers, config.judge.clone()))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn judge_config(&self) -> &JudgeConfig {
        &self.judge
    }

    /// The backend that will grade `subject_id`
    pub fn judge_for(&self, subject_id: &str) -> ProviderResult<ModelSpec> {
        select_judge(&self.registry, subject_id, &self.judge)
    }

    /// Evaluate one request with no progress reporting
    pub async fn run(&self, request: &EvaluationRequest) -> Result<EvaluationReport, EvaluationError> {
        self.run_with(request, &NoOpProgress, &CancellationToken::new())
            .await
    }

    /// Evaluate one request. Iterations run strictly in order; `cancel` is
    /// checked before each iteration and before the verdict.
    pub async fn run_with(
        &self,
        request: &EvaluationRequest,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<EvaluationReport, EvaluationError> {
        let spec = self.registry.resolve(&request.model);
        let subject = GenerationClient::from_providers(spec, &self.providers)?;
        let judge = JudgeClient::for_subject(
            &self.registry,
            &self.providers,
            &request.model,
            request.evaluation_criteria(),
            &self.judge,
        )?;

        tracing::info!(
            "Evaluating {} ({}) with judge {} over {} iterations",
            request.model,
            subject.spec().provider_model_id,
            judge.spec().symbolic_id,
            request.iterations
        );
        progress.on_start(&request.model, request.iterations);

        let generation = request.generation_request();
        let mut records = Vec::new();

        for iteration in 1..=request.iterations {
            if cancel.is_cancelled() {
                return Err(EvaluationError::Cancelled {
                    completed: records.len(),
                });
            }

            let record = match subject.generate(&generation).await? {
                GenerationResult::Rejected(message) => IterationRecord::failed(iteration, message),
                GenerationResult::Text(prediction) => {
                    match judge
                        .score(&prediction, &request.prompt, &request.expected_result)
                        .await?
                    {
                        GenerationResult::Rejected(message) => {
                            IterationRecord::failed(iteration, message)
                        }
                        GenerationResult::Text(rationale) => {
                            let score = extract_score(&rationale);
                            IterationRecord::scored(iteration, prediction, score, rationale)
                        }
                    }
                }
            };

            match (&record.prediction, record.score) {
                (None, _) => tracing::warn!(
                    "Iteration {} failed: {}",
                    iteration,
                    record.rationale
                ),
                (Some(_), Some(score)) => tracing::info!("Iteration {} scored {}", iteration, score),
                (Some(_), None) => tracing::info!("Iteration {} has no score marker", iteration),
            }

            progress.on_iteration(&record, request.iterations);
            records.push(record);
        }

        if cancel.is_cancelled() {
            return Err(EvaluationError::Cancelled {
                completed: records.len(),
            });
        }

        let final_verdict = match judge
            .final_verdict(&request.model, request.iterations)
            .await?
        {
            GenerationResult::Text(text) => text,
            GenerationResult::Rejected(message) => message,
        };

        let report = EvaluationReport::new(records, final_verdict, request.temperature);
        match report.average_score {
            Some(avg) => tracing::info!("{}: average score {:.2}", request.model, avg),
            None => tracing::info!("{}: no scored iterations", request.model),
        }
        progress.on_complete(&report);
        Ok(report)
    }

    /// Evaluate requests one after another. Each row stands alone: a fatal
    /// error is recorded on its row and the batch continues. Cancellation
    /// stops the batch.
    pub async fn run_batch(
        &self,
        requests: &[EvaluationRequest],
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());

        for request in requests {
            match self.run_with(request, progress, cancel).await {
                Ok(report) => outcomes.push(BatchOutcome {
                    model: request.model.clone(),
                    report: Some(report),
                    error: None,
                }),
                Err(e @ EvaluationError::Cancelled { .. }) => {
                    tracing::warn!("Batch stopped: {}", e);
                    outcomes.push(BatchOutcome {
                        model: request.model.clone(),
                        report: None,
                        error: Some(e.to_string()),
                    });
                    break;
                }
                Err(e) => {
                    tracing::error!("Evaluation of {} failed: {}", request.model, e);
                    outcomes.push(BatchOutcome {
                        model: request.model.clone(),
                        report: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{Call, ScriptedProvider};
    use crate::registry::ProviderFamily;
    use std::sync::Mutex;

    fn evaluator_with(
        openai: Arc<ScriptedProvider>,
        bedrock: Arc<ScriptedProvider>,
    ) -> Evaluator {
        let providers = ProviderSet::new()
            .with(ProviderFamily::OpenAI, openai)
            .with(ProviderFamily::Bedrock, bedrock);
        Evaluator::new(Registry::builtin(), providers, JudgeConfig::default())
    }

    fn request(model: &str, iterations: u32) -> EvaluationRequest {
        EvaluationRequest::new(model, "Write a poem about the sea.", "Score 10: Perfect. Score 1: Bad.", "A beautiful poem about the sea.")
            .with_temperature(0.5)
            .with_max_new_tokens(100)
            .with_iterations(iterations)
    }

    #[tokio::test]
    async fn test_records_numbered_in_order() {
        // Subject on OpenAI, judge (llama_3_70b) on Bedrock
        let subject = Arc::new(ScriptedProvider::new().reply("p1").reply("p2").reply("p3"));
        let judge = Arc::new(
            ScriptedProvider::new()
                .reply("ok [[6]]")
                .reply("good [[8]]")
                .reply("fine [[7]]")
                .reply("Verdict text"),
        );
        let report = evaluator_with(subject, judge).run(&request("gpt_4", 3)).await.unwrap();

        let numbers: Vec<u32> = report.records.iter().map(|r| r.iteration_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let predictions: Vec<_> = report.records.iter().map(|r| r.prediction.clone().unwrap()).collect();
        assert_eq!(predictions, vec!["p1", "p2", "p3"]);
        assert_eq!(report.average_score, Some(7.0));
        assert_eq!(report.final_verdict, "Verdict text");
        assert_eq!(report.temperature_echo, 0.5);
    }

    #[tokio::test]
    async fn test_generation_rejection_is_iteration_local() {
        let subject = Arc::new(
            ScriptedProvider::new()
                .reply("first")
                .fail(ProviderError::InvalidArgument("temperature out of range".into()))
                .reply("third"),
        );
        let judge = Arc::new(
            ScriptedProvider::new()
                .reply("[[4]]")
                .reply("[[8]]")
                .reply("verdict"),
        );
        let report = evaluator_with(subject, judge).run(&request("gpt_4", 3)).await.unwrap();

        assert_eq!(report.records.len(), 3);
        let failed = &report.records[1];
        assert_eq!(failed.iteration_number, 2);
        assert!(failed.prediction.is_none());
        assert!(failed.score.is_none());
        assert_eq!(failed.rationale, "temperature out of range");
        assert_eq!(report.records[2].prediction.as_deref(), Some("third"));
        assert_eq!(report.average_score, Some(6.0));
    }

    #[tokio::test]
    async fn test_scoring_rejection_drops_prediction() {
        let subject = Arc::new(ScriptedProvider::new().reply("a poem"));
        let judge = Arc::new(
            ScriptedProvider::new()
                .fail(ProviderError::InvalidArgument("input too long".into()))
                .reply("verdict"),
        );
        let report = evaluator_with(subject, judge).run(&request("gpt_4", 1)).await.unwrap();
        assert!(report.records[0].is_failed());
        assert_eq!(report.records[0].rationale, "input too long");
        assert_eq!(report.average_score, None);
    }

    #[tokio::test]
    async fn test_missing_marker_keeps_prediction() {
        let subject = Arc::new(ScriptedProvider::new().reply("a poem"));
        let judge = Arc::new(ScriptedProvider::new().reply("I liked it.").reply("verdict"));
        let report = evaluator_with(subject, judge).run(&request("gpt_4", 1)).await.unwrap();
        let record = &report.records[0];
        assert_eq!(record.prediction.as_deref(), Some("a poem"));
        assert_eq!(record.score, None);
        assert_eq!(record.rationale, "I liked it.");
        assert_eq!(report.average_score, None);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_run() {
        let subject = Arc::new(
            ScriptedProvider::new()
                .reply("ok")
                .fail(ProviderError::RateLimited { retry_after_ms: 1000 }),
        );
        let judge = Arc::new(ScriptedProvider::new());
        let result = evaluator_with(subject, judge).run(&request("gpt_4", 3)).await;
        assert!(matches!(
            result,
            Err(EvaluationError::Provider(ProviderError::RateLimited { .. }))
        ));
    }

    #[tokio::test]
    async fn test_verdict_rejection_becomes_verdict_text() {
        let subject = Arc::new(ScriptedProvider::new());
        let judge = Arc::new(
            ScriptedProvider::new().fail(ProviderError::InvalidArgument("verdict refused".into())),
        );
        let report = evaluator_with(subject, judge).run(&request("gpt_4", 0)).await.unwrap();
        assert_eq!(report.final_verdict, "verdict refused");
    }

    #[tokio::test]
    async fn test_fatal_scoring_error_aborts_run() {
        let subject = Arc::new(ScriptedProvider::new().reply("first").reply("second"));
        let judge = Arc::new(
            ScriptedProvider::new()
                .reply("[[6]]")
                .fail(ProviderError::Timeout { timeout_ms: 120_000 }),
        );
        let result = evaluator_with(subject.clone(), judge.clone())
            .run(&request("gpt_4", 3))
            .await;
        assert!(matches!(
            result,
            Err(EvaluationError::Provider(ProviderError::Timeout { timeout_ms: 120_000 }))
        ));
        assert_eq!(subject.calls().len(), 2);
        assert_eq!(judge.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fatal_verdict_error_aborts_run() {
        let subject = Arc::new(ScriptedProvider::new().reply("poem"));
        let judge = Arc::new(
            ScriptedProvider::new()
                .reply("[[8]]")
                .fail(ProviderError::Api {
                    status: 503,
                    message: "overloaded".into(),
                }),
        );
        let result = evaluator_with(subject, judge).run(&request("gpt_4", 1)).await;
        assert!(matches!(
            result,
            Err(EvaluationError::Provider(ProviderError::Api { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_huge_iteration_count_cancels_cleanly() {
        let subject = Arc::new(ScriptedProvider::new());
        let judge = Arc::new(ScriptedProvider::new());
        let token = CancellationToken::new();
        token.cancel();

        let result = evaluator_with(subject.clone(), judge)
            .run_with(&request("gpt_4", u32::MAX), &NoOpProgress, &token)
            .await;
        assert!(matches!(result, Err(EvaluationError::Cancelled { completed: 0 })));
        assert!(subject.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_iterations_still_asks_for_verdict() {
        let subject = Arc::new(ScriptedProvider::new());
        let judge = Arc::new(ScriptedProvider::new().reply("Nothing to judge yet."));
        let report = evaluator_with(subject.clone(), judge.clone())
            .run(&request("gpt_4", 0))
            .await
            .unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.average_score, None);
        assert_eq!(report.final_verdict, "Nothing to judge yet.");
        assert!(subject.calls().is_empty());
        assert_eq!(judge.calls().len(), 1);
        assert!(judge.calls()[0].prompt().contains("gpt_4"));
        assert!(judge.calls()[0].prompt().contains("0 iterations"));
    }

    #[tokio::test]
    async fn test_judge_substitution_when_subject_is_judge() {
        // llama_3_70b is the default judge; grading must move to gpt_4o on OpenAI
        let openai = Arc::new(ScriptedProvider::new().reply("[[9]]").reply("verdict"));
        let bedrock = Arc::new(ScriptedProvider::new().reply("llama output"));
        let evaluator = evaluator_with(openai.clone(), bedrock.clone());
        assert_eq!(evaluator.judge_for("llama_3_70b").unwrap().symbolic_id, "gpt_4o");

        let report = evaluator.run(&request("llama_3_70b", 1)).await.unwrap();
        assert_eq!(report.records[0].score, Some(9));

        let bedrock_calls = bedrock.calls();
        assert_eq!(bedrock_calls.len(), 1);
        assert_eq!(bedrock_calls[0].model(), "meta.llama3-70b-instruct-v1:0");
        assert!(openai.calls().iter().all(|c| c.model() == "gpt-4o"));
    }

    #[tokio::test]
    async fn test_unknown_model_uses_default_completion_backend() {
        let openai = Arc::new(ScriptedProvider::new().reply("default output"));
        let bedrock = Arc::new(ScriptedProvider::new().reply("[[3]]").reply("verdict"));
        let report = evaluator_with(openai.clone(), bedrock)
            .run(&request("mystery_model", 1))
            .await
            .unwrap();
        assert_eq!(report.records[0].score, Some(3));
        match &openai.calls()[0] {
            Call::Text { model, prompt, .. } => {
                assert_eq!(model, "gpt-3.5-turbo-instruct");
                assert_eq!(prompt, "Write a poem about the sea.");
            }
            other => panic!("expected text call, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_provider_is_fatal() {
        let providers = ProviderSet::new().with(ProviderFamily::OpenAI, Arc::new(ScriptedProvider::new()));
        let evaluator = Evaluator::new(Registry::builtin(), providers, JudgeConfig::default());
        // Judge lives on Bedrock, which has no client
        let result = evaluator.run(&request("gpt_4", 1)).await;
        assert!(matches!(
            result,
            Err(EvaluationError::Provider(ProviderError::Config(_)))
        ));
    }

    struct CancelAfter {
        token: CancellationToken,
        after: u32,
        seen: Mutex<Vec<u32>>,
    }

    impl ProgressCallback for CancelAfter {
        fn on_start(&self, _model: &str, _iterations: u32) {}
        fn on_iteration(&self, record: &IterationRecord, _total: u32) {
            self.seen.lock().unwrap().push(record.iteration_number);
            if record.iteration_number == self.after {
                self.token.cancel();
            }
        }
        fn on_complete(&self, _report: &EvaluationReport) {}
    }

    #[tokio::test]
    async fn test_cancellation_at_iteration_boundary() {
        let subject = Arc::new(ScriptedProvider::new());
        let judge = Arc::new(ScriptedProvider::new());
        let token = CancellationToken::new();
        let progress = CancelAfter {
            token: token.clone(),
            after: 2,
            seen: Mutex::new(Vec::new()),
        };

        let result = evaluator_with(subject.clone(), judge)
            .run_with(&request("gpt_4", 5), &progress, &token)
            .await;
        assert!(matches!(result, Err(EvaluationError::Cancelled { completed: 2 })));
        assert_eq!(*progress.seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(subject.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_batch_records_fatal_rows_and_continues() {
        let openai = Arc::new(
            ScriptedProvider::new()
                .reply("first")
                .fail(ProviderError::Config("OpenAI auth error (401): bad key".into()))
                .reply("third"),
        );
        let bedrock = Arc::new(
            ScriptedProvider::new()
                .reply("[[7]]")
                .reply("verdict one")
                .reply("[[5]]")
                .reply("verdict three"),
        );
        let requests = vec![request("gpt_4", 1), request("gpt_4o", 1), request("gpt_3.5", 1)];
        let outcomes = evaluator_with(openai, bedrock)
            .run_batch(&requests, &NoOpProgress, &CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].report.as_ref().unwrap().average_score, Some(7.0));
        assert!(outcomes[1].report.is_none());
        assert!(outcomes[1].error.as_deref().unwrap().contains("auth error"));
        assert_eq!(outcomes[2].model, "gpt_3.5");
        assert_eq!(outcomes[2].report.as_ref().unwrap().final_verdict, "verdict three");

        let json = serde_json::to_value(&outcomes[0]).unwrap();
        assert_eq!(json["model"], "gpt_4");
        assert!(json["eval_results"].is_array());
        assert!(json.get("error").is_none());
    }
}

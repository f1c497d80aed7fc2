//! Judge-scored quality evaluation for LLM backends
//!
//! This crate evaluates a subject model by repeatedly generating a response
//! to a prompt, having a separate judge model grade each response against
//! caller-supplied criteria and a reference answer, averaging the extracted
//! scores, and asking the judge for a final verdict.
//!
//! # Features
//!
//! - Symbolic model ids resolved to OpenAI, Bedrock, or watsonx backends
//! - Chat and plain-completion invocation styles
//! - Per-iteration failure isolation for rejected requests
//! - Automatic judge substitution when the subject is the judge
//! - Single-request and CSV/JSON batch evaluation
//!
//! # Example
//!
//! ```no_run
//! use llm_evaluator::{
//!     config::{Config, Credentials},
//!     requests::EvaluationRequest,
//!     runner::Evaluator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let credentials = Credentials::from_env(&config.providers);
//!     let evaluator = Evaluator::from_config(&config, &credentials)?;
//!
//!     let request = EvaluationRequest::new(
//!         "llama_3_8b",
//!         "Write a poem about the sea.",
//!         "Score 10: Perfect. Score 1: Bad.",
//!         "A beautiful poem about the sea.",
//!     )
//!     .with_iterations(3);
//!
//!     let report = evaluator.run(&request).await?;
//!     println!("{:?}", report.average_score);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod judge;
pub mod providers;
pub mod registry;
pub mod reporting;
pub mod requests;
pub mod runner;
pub mod scoring;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::client::{GenerationClient, GenerationRequest, GenerationResult};
    pub use crate::config::{Config, Credentials, JudgeConfig};
    pub use crate::judge::{select_judge, EvaluationCriteria, JudgeClient};
    pub use crate::providers::{
        Message, ProviderError, ProviderResult, ProviderSet, SamplingParams,
        TextGenerationProvider,
    };
    pub use crate::registry::{ModelSpec, ProviderFamily, ProviderKind, Registry};
    pub use crate::reporting::{print_console_report, BatchSummary, RunSummary};
    pub use crate::requests::{
        load_requests_from_file, EvaluationRequest, RawEvaluationRequest, RequestError,
    };
    pub use crate::runner::{
        BatchOutcome, ConsoleProgress, EvaluationError, EvaluationReport, Evaluator,
        IterationRecord, NoOpProgress, ProgressCallback,
    };
    pub use crate::scoring::{average_score, extract_score};
}

//! Evaluation runner

pub mod evaluator;
pub mod progress;
pub mod report;

pub use evaluator::{BatchOutcome, EvaluationError, Evaluator};
pub use progress::{ConsoleProgress, NoOpProgress, ProgressCallback};
pub use report::{EvaluationReport, IterationRecord};

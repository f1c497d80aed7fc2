//! Progress callbacks for streaming per-iteration results

use super::report::{EvaluationReport, IterationRecord};

/// Observer for a running evaluation. Called in iteration order.
pub trait ProgressCallback: Send + Sync {
    fn on_start(&self, model: &str, iterations: u32);
    fn on_iteration(&self, record: &IterationRecord, total: u32);
    fn on_complete(&self, report: &EvaluationReport);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_start(&self, _model: &str, _iterations: u32) {}
    fn on_iteration(&self, _record: &IterationRecord, _total: u32) {}
    fn on_complete(&self, _report: &EvaluationReport) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_start(&self, model: &str, iterations: u32) {
        println!("Evaluating {} over {} iterations...", model, iterations);
    }

    fn on_iteration(&self, record: &IterationRecord, total: u32) {
        let status = match (&record.prediction, record.score) {
            (None, _) => "FAILED".to_string(),
            (Some(_), Some(score)) => format!("score {}", score),
            (Some(_), None) => "unscored".to_string(),
        };
        println!("  [{}/{}] {}", record.iteration_number, total, status);
    }

    fn on_complete(&self, report: &EvaluationReport) {
        println!("{} iterations completed", report.records.len());
    }
}

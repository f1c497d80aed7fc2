//! Results reporting

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::runner::{BatchOutcome, EvaluationReport};

/// JSON export of a single evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: String,
    pub model: String,
    pub judge_model: String,
    #[serde(flatten)]
    pub report: EvaluationReport,
}

impl RunSummary {
    pub fn new(
        run_id: impl Into<String>,
        model: impl Into<String>,
        judge_model: impl Into<String>,
        report: EvaluationReport,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            model: model.into(),
            judge_model: judge_model.into(),
            report,
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        write_json(self, path)
    }
}

/// JSON export of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub timestamp: String,
    pub total: usize,
    pub failed: usize,
    pub results: Vec<BatchOutcome>,
}

impl BatchSummary {
    pub fn new(run_id: impl Into<String>, results: Vec<BatchOutcome>) -> Self {
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total: results.len(),
            failed,
            results,
        }
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        write_json(self, path)
    }
}

fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

fn format_average(average: Option<f64>) -> String {
    match average {
        Some(avg) => format!("{:.2}", avg),
        None => "n/a".to_string(),
    }
}

/// Generate a console report
pub fn print_console_report(model: &str, report: &EvaluationReport) {
    println!("\n=== Evaluation Results: {} ===\n", model);
    println!(
        "Iterations: {} ({} scored, {} failed)",
        report.records.len(),
        report.scored_count(),
        report.failed_count()
    );
    println!("Temperature: {}", report.temperature_echo);
    println!("Average Score: {}\n", format_average(report.average_score));

    if !report.records.is_empty() {
        println!("Iterations:");
        println!("{:-<50}", "");
        for record in &report.records {
            match (&record.prediction, record.score) {
                (None, _) => println!("  {}. FAILED - {}", record.iteration_number, record.rationale),
                (Some(_), Some(score)) => println!("  {}. Score: {}", record.iteration_number, score),
                (Some(_), None) => println!("  {}. Score: -", record.iteration_number),
            }
        }
        println!();
    }

    println!("Final Verdict:");
    println!("{:-<50}", "");
    println!("{}", report.final_verdict);
}

/// Console table for a batch run
pub fn print_batch_report(outcomes: &[BatchOutcome]) {
    println!("\n=== Batch Evaluation Results ===\n");
    println!("Evaluations: {}\n", outcomes.len());
    println!("{:-<60}", "");

    for (i, outcome) in outcomes.iter().enumerate() {
        match (&outcome.report, &outcome.error) {
            (Some(report), _) => println!(
                "  {}. {} - Avg Score: {}, Iterations: {}",
                i + 1,
                outcome.model,
                format_average(report.average_score),
                report.records.len()
            ),
            (None, Some(error)) => println!("  {}. {} - ERROR: {}", i + 1, outcome.model, error),
            (None, None) => println!("  {}. {} - no result", i + 1, outcome.model),
        }
    }
}

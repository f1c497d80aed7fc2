//! LLM Evaluator CLI

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use llm_evaluator::{
    config::{Config, Credentials},
    registry::Registry,
    reporting::{print_batch_report, print_console_report, BatchSummary, RunSummary},
    requests::{load_requests_from_file, EvaluationRequest},
    runner::{ConsoleProgress, Evaluator},
};

#[derive(Parser)]
#[command(name = "llm-evaluator")]
#[command(about = "Judge-scored response quality evaluation for LLM backends")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one model on one prompt
    Run {
        /// Symbolic model id (see list-models)
        #[arg(short, long)]
        model: String,

        /// Prompt sent to the model under evaluation
        #[arg(short, long)]
        prompt: String,

        /// Grading rubric passed to the judge
        #[arg(long)]
        criteria: String,

        /// Reference answer the judge compares against
        #[arg(short, long)]
        expected_result: String,

        /// Sampling temperature for the subject model
        #[arg(short, long, default_value = "0.5")]
        temperature: f32,

        /// Token budget per generation
        #[arg(long, default_value = "1024")]
        max_new_tokens: u32,

        /// Number of generate-and-score rounds
        #[arg(short, long, default_value = "1")]
        iterations: u32,

        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Evaluate every request in a CSV or JSON file
    Batch {
        /// Path to the batch file
        #[arg(short, long)]
        input: PathBuf,

        /// Write the JSON results to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List known model ids
    ListModels,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/evaluator.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("llm_evaluator=debug,info")
    } else {
        EnvFilter::new("llm_evaluator=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::Run {
            model,
            prompt,
            criteria,
            expected_result,
            temperature,
            max_new_tokens,
            iterations,
            output,
        } => {
            let request = EvaluationRequest::new(model, prompt, criteria, expected_result)
                .with_temperature(temperature)
                .with_max_new_tokens(max_new_tokens)
                .with_iterations(iterations);
            run_evaluation(&config, request, output).await?;
        }

        Commands::Batch { input, output } => {
            run_batch(&config, input, output).await?;
        }

        Commands::ListModels => {
            list_models(&config);
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn build_evaluator(config: &Config) -> Result<Evaluator, Box<dyn std::error::Error>> {
    let credentials = Credentials::from_env(&config.providers);
    let evaluator = Evaluator::from_config(config, &credentials)?;
    Ok(evaluator)
}

/// Cancel `token` on Ctrl-C so the run stops at the next iteration boundary
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current iteration");
            token.cancel();
        }
    });
}

async fn run_evaluation(
    config: &Config,
    request: EvaluationRequest,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    request.validate()?;

    let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let evaluator = build_evaluator(config)?;
    let judge = evaluator.judge_for(&request.model)?;

    println!("=== LLM Evaluator ===");
    println!("Run ID: {}", run_id);
    println!("Model:  {}", request.model);
    println!("Judge:  {}", judge.symbolic_id);
    println!();

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let report = evaluator
        .run_with(&request, &ConsoleProgress, &cancel)
        .await?;

    print_console_report(&request.model, &report);

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        RunSummary::new(run_id, &request.model, judge.symbolic_id, report).write_to_file(&path)?;
        println!("\nResults written to: {}", path.display());
    }

    Ok(())
}

async fn run_batch(
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let requests = load_requests_from_file(&input)?;
    if requests.is_empty() {
        eprintln!("Error: No evaluation requests in {}", input.display());
        std::process::exit(1);
    }

    let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let evaluator = build_evaluator(config)?;

    println!("=== LLM Evaluator (batch) ===");
    println!("Run ID: {}", run_id);
    println!("Requests: {}", requests.len());
    println!();

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let outcomes = evaluator
        .run_batch(&requests, &ConsoleProgress, &cancel)
        .await;

    print_batch_report(&outcomes);

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        BatchSummary::new(run_id, outcomes).write_to_file(&path)?;
        println!("\nResults written to: {}", path.display());
    }

    Ok(())
}

fn list_models(config: &Config) {
    let specs = Registry::with_overrides(&config.models).specs();

    println!("Available Models ({}):", specs.len());
    println!("{:-<60}", "");

    for spec in &specs {
        println!(
            "  {} | {} | {}",
            spec.symbolic_id, spec.provider, spec.provider_model_id
        );
    }

    println!();
    println!("Judge: {} (fallback {})", config.judge.model, config.judge.fallback_model);
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}

mod config;
mod wiring;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use claims::ClaimVerdict;
use index::QdrantRetriever;
use query::PolicyFaq;
use rules::{PolicyRules, RulesEngine};
use workflow::{ClaimWorkflow, RunOptions};

use crate::config::{AppConfig, LogFormat};

#[derive(Parser)]
#[command(name = "claimctl", version, about = "Health insurance claim adjudication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Adjudicate a free-text claim query
    Claim {
        query: String,
        /// Include per-stage timings in the response
        #[arg(long)]
        trace: bool,
        /// Decide with the rules engine only, without network services
        #[arg(long)]
        offline: bool,
    },
    /// Answer policy questions from the indexed policy text
    Faq {
        #[arg(required = true)]
        questions: Vec<String>,
    },
    /// Evaluate a claim JSON file with the rules engine
    Rules { file: PathBuf },
}

#[derive(Serialize)]
struct RulesOutput {
    verdict: ClaimVerdict,
    summary: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(&config);

    tracing::debug!(mode = ?config.mode, "Configuration loaded");
    let engine = Arc::new(RulesEngine::new(PolicyRules::load(config.policy_file.as_deref())));

    match cli.command {
        Commands::Claim { query, trace, offline } => {
            let collaborators = if offline {
                wiring::offline_collaborators(engine.clone())
            } else {
                wiring::online_collaborators(&config, &engine).await?
            };
            let workflow = ClaimWorkflow::new(engine, collaborators, wiring::workflow_config(&config));

            let response = workflow.run(&query, RunOptions { trace_mode: trace }).await;
            tracing::debug!(metrics = ?workflow.metrics().snapshot(), "Run complete");
            print_json(&response)?;
        }
        Commands::Faq { questions } => {
            let retriever = Arc::new(QdrantRetriever::new(wiring::policy_collection(&config)?));
            let faq = PolicyFaq::new(retriever, wiring::llm_client(&config)?);
            print_json(&faq.answer_all(&questions).await)?;
        }
        Commands::Rules { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read claim file {}", file.display()))?;
            let verdict = engine.process_claim(&raw);
            let summary = engine.summarize(&verdict);
            print_json(&RulesOutput { verdict, summary })?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins, then `LOG_LEVEL`, then info. Logs go to stderr so
/// stdout stays valid JSON.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

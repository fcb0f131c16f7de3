//! Tagloop — ask questions of a tool-calling agent from the terminal.
//!
//! Usage:
//!   tagloop ask "What was the price of Ethereum on Jan 12, 2024?"
//!   tagloop tools            Print the tool catalogue
//!   tagloop init             Write a default config file
//!   tagloop config           Show the effective configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::future::Future;
use std::path::Path;
use tracing::info;

use tagloop::agent::Agent;
use tagloop::config::{self, AgentConfig, EmptyTurnPolicy};
use tagloop::error::AgentError;
use tagloop::llm::ChatClient;
use tagloop::tools::market::market_tools;
use tagloop::types::*;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "tagloop")]
#[command(version)]
#[command(about = "ReAct tool-calling agent over a tag protocol")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file [default: ~/.tagloop/agent.toml].
    #[arg(long)]
    config: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer one question.
    Ask {
        /// The question to answer.
        question: String,

        /// Maximum model calls for this run.
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Give up on the first output with nothing to act on.
        #[arg(long)]
        strict: bool,

        /// Print the full conversation after the run.
        #[arg(long)]
        transcript: bool,
    },

    /// Print the tool catalogue shown to the model.
    Tools,

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration.
    Config,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(config::resolve_path)
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(cfg.log_level.as_str());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            max_iterations,
            strict,
            transcript,
        } => {
            let mut cfg = cfg;
            if let Some(n) = max_iterations {
                cfg.max_iterations = n;
            }
            if strict {
                cfg.empty_turn_policy = EmptyTurnPolicy::Fail;
            }
            cmd_ask(cfg, &question, transcript).await
        }
        Commands::Tools => cmd_tools(&cfg),
        Commands::Init { force } => cmd_init(&config_path, force),
        Commands::Config => cmd_config(&cfg, &config_path),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_ask(cfg: AgentConfig, question: &str, transcript: bool) -> Result<()> {
    let model = ChatClient::from_config(&cfg)?;
    let agent = Agent::from_config(model, market_tools(&cfg)?, &cfg)?;

    info!(
        "Asking {} (max {} iterations, {} tools)",
        cfg.model,
        agent.max_iterations(),
        agent.registry().len()
    );

    let result = until_interrupted(agent.run(question), tokio::signal::ctrl_c()).await?;

    match result {
        Ok(outcome) => {
            if transcript {
                print_transcript(&outcome.history);
            }
            println!("{} {}", ">>>".green().bold(), outcome.response);
            Ok(())
        }
        Err(err) => {
            if transcript {
                print_transcript(err.history());
            }
            if let AgentError::IterationLimitExceeded { partial, .. } = &err {
                println!("{} {}", "~~~".yellow().bold(), partial);
            }
            eprintln!("{} {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}

fn cmd_tools(cfg: &AgentConfig) -> Result<()> {
    let tools = market_tools(cfg)?;
    let registry = tagloop::tools::ToolRegistry::new(tools)?;
    println!("{}", registry.catalogue_json());
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        eprintln!(
            "{} Config already exists at {}. Use --force to overwrite.",
            "Error:".red().bold(),
            config_path.display()
        );
        std::process::exit(1);
    }

    config::save_config(&AgentConfig::default(), config_path)?;
    println!(
        "{} Wrote default config to {}",
        ">>>".green().bold(),
        config_path.display()
    );
    Ok(())
}

fn cmd_config(cfg: &AgentConfig, config_path: &Path) -> Result<()> {
    let key_state = if cfg.resolved_api_key().is_empty() {
        "missing".red().to_string()
    } else {
        "set".green().to_string()
    };

    println!();
    println!("{}", "=== Tagloop Config ===".bold());
    println!();
    println!("  {}:  {}", "File".bold(), config_path.display());
    println!("  {}:", "Model".bold());
    println!("    Name:        {}", cfg.model);
    println!("    API:         {}", cfg.api_url);
    println!("    API key:     {} ({})", key_state, cfg.api_key_env);
    println!("    Max tokens:  {}", cfg.max_tokens);
    println!("    Temperature: {}", cfg.temperature);
    println!();
    println!("  {}:", "Loop".bold());
    println!("    Max iterations: {}", cfg.max_iterations);
    println!("    Empty turns:    {}", cfg.empty_turn_policy);
    println!("    Market API:     {}", cfg.market_api_url);
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drive `work` to completion unless `interrupt` fires first, in which case
/// the command fails so the process exits non-zero.
async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> Result<T> {
    tokio::select! {
        out = work => Ok(out),
        _ = interrupt => {
            println!("\n{} Interrupted", "<<<".red().bold());
            bail!("interrupted before a final response");
        }
    }
}

fn print_transcript(history: &[ChatMessage]) {
    // The system prompt is long and fixed; skip it.
    for turn in history.iter().skip(1) {
        println!("{} {}", colorize_role(turn), turn.content);
        println!();
    }
}

fn colorize_role(turn: &ChatMessage) -> String {
    let label = format!("[{}]", turn.role);
    match turn.role {
        ChatRole::System => label.yellow().to_string(),
        ChatRole::User if turn.is_observation() => label.cyan().to_string(),
        ChatRole::User => label.blue().bold().to_string(),
        ChatRole::Assistant => label.green().to_string(),
    }
}

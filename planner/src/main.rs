//! Objective planner CLI.
//!
//! Decomposes an objective into a task plan through a collaborator command,
//! executes it with the configured strategy and prints a summary.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use planner::core::types::{PlanStatus, Strategy};
use planner::engine::Engine;
use planner::exit_codes;
use planner::io::collaborator::CommandCollaborator;
use planner::io::config::{CONFIG_FILE_NAME, EngineConfig, load_config, write_config};
use planner::logging;
use planner::parse::{parse_flat, parse_hierarchical};
use planner::strategy::select_strategy;
use planner::validate::validate_plan_document;

#[derive(Parser)]
#[command(
    name = "planner",
    version,
    about = "Plan and execute objectives through a collaborator command"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan, execute and summarize an objective.
    Run {
        /// Override the configured strategy (sequential, parallel, hierarchical, adaptive).
        #[arg(short, long, value_parser = parse_strategy)]
        strategy: Option<Strategy>,
        /// Config file; defaults apply when it does not exist.
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Print the final plan and summary as JSON.
        #[arg(long)]
        json: bool,
        objective: String,
    },
    /// Parse collaborator text offline and print the tasks as JSON.
    Parse {
        #[arg(short, long, value_enum, default_value_t = Grammar::Flat)]
        grammar: Grammar,
        /// Input file; reads stdin when omitted.
        file: Option<PathBuf>,
    },
    /// Check a plan document against the schema and semantic invariants.
    Validate { plan: PathBuf },
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Grammar {
    /// Numbered or bulleted list, one task per item.
    Flat,
    /// PHASE / TASK / SUBTASK headers with attribute lines.
    Hierarchical,
}

fn parse_strategy(raw: &str) -> Result<Strategy, String> {
    raw.parse()
}

#[tokio::main]
async fn main() {
    logging::init();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            strategy,
            config,
            json,
            objective,
        } => cmd_run(&config, strategy, json, &objective).await,
        Command::Parse { grammar, file } => cmd_parse(grammar, file.as_deref()),
        Command::Validate { plan } => cmd_validate(&plan),
        Command::Init { force, config } => cmd_init(&config, force),
    }
}

async fn cmd_run(
    config_path: &Path,
    strategy: Option<Strategy>,
    json: bool,
    objective: &str,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    config.strategy = select_strategy(&config, strategy);

    let collaborator = CommandCollaborator::new(config.collaborator.clone());
    let engine = Engine::new(collaborator.clone(), collaborator, config);

    if !json {
        let mut events = engine.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => eprintln!("{}", event.message()),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let outcome = engine.run(objective).await.context("plan objective")?;
    if json {
        print_json(&outcome)?;
    } else {
        println!("{}", outcome.summary);
    }

    Ok(match outcome.plan.status {
        PlanStatus::Completed => exit_codes::OK,
        _ => exit_codes::FAILED,
    })
}

fn cmd_parse(grammar: Grammar, file: Option<&Path>) -> Result<i32> {
    let text = match file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };
    let tasks = match grammar {
        Grammar::Flat => parse_flat(&text),
        Grammar::Hierarchical => parse_hierarchical(&text),
    };
    print_json(&tasks)?;
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let plan = validate_plan_document(&raw).with_context(|| format!("validate {}", path.display()))?;
    println!(
        "{}: valid ({} top-level tasks, {}% complete)",
        path.display(),
        plan.tasks.len(),
        plan.progress
    );
    Ok(exit_codes::OK)
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        eprintln!("{} already exists (use --force to overwrite)", path.display());
        return Ok(exit_codes::OK);
    }
    write_config(path, &EngineConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{}", payload);
    Ok(())
}

//! Notebook task runner CLI.
//!
//! Thin driver over the library: discover tasks under a folder, inspect a
//! notebook's declared parameters and scheduling conditions, or execute one
//! notebook with parameters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use nbtask::io::config::load_config;
use nbtask::io::discover::{DiscoverOptions, discover_tasks};
use nbtask::io::notebook::{FsNotebookStore, load_notebook};
use nbtask::io::params::ParameterBundle;
use nbtask::io::runner::{CommandRunner, RunStatus};
use nbtask::meta::{discover_parameter_names, extract_conditions};
use nbtask::task::NotebookTask;

#[derive(Parser)]
#[command(name = "nbtask", version, about = "Notebook-backed task runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List tasks discovered under a folder, with their conditions.
    Discover {
        root: PathBuf,
        /// File-name pattern; `*` does not cross directories.
        #[arg(long, default_value = "*.ipynb")]
        pattern: String,
    },
    /// Print parameter names declared by a notebook's parameter cell.
    Params { notebook: PathBuf },
    /// Print condition metadata extracted from a notebook's conditions cell.
    Conditions { notebook: PathBuf },
    /// Execute a notebook once with the given parameters.
    Run {
        notebook: PathBuf,
        /// Parameter as NAME=VALUE; VALUE is parsed as a YAML literal.
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Runner configuration (TOML); defaults apply when missing.
        #[arg(long, default_value = "nbtask.toml")]
        config: PathBuf,
        /// Write the captured execution output to this file.
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

fn main() {
    nbtask::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Discover { root, pattern } => cmd_discover(&root, pattern),
        Command::Params { notebook } => cmd_params(&notebook),
        Command::Conditions { notebook } => cmd_conditions(&notebook),
        Command::Run {
            notebook,
            params,
            config,
            log,
        } => cmd_run(&notebook, &params, &config, log),
    }
}

fn cmd_discover(root: &PathBuf, pattern: String) -> Result<()> {
    let options = DiscoverOptions {
        pattern,
        ..DiscoverOptions::default()
    };
    let mut tasks = discover_tasks(root, Arc::new(FsNotebookStore), &options)?;
    tasks.sort_by_key(|task| task.name().to_string());
    for task in &tasks {
        let conditions = serde_json::to_string(task.conditions())?;
        println!("{}\t{}", task.name(), conditions);
    }
    Ok(())
}

fn cmd_params(notebook: &PathBuf) -> Result<()> {
    let nb = load_notebook(notebook)?;
    for name in discover_parameter_names(&nb) {
        println!("{name}");
    }
    Ok(())
}

fn cmd_conditions(notebook: &PathBuf) -> Result<()> {
    let nb = load_notebook(notebook)?;
    let metadata = extract_conditions(&nb)
        .with_context(|| format!("inspect {}", notebook.display()))?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

fn cmd_run(
    notebook: &PathBuf,
    params: &[String],
    config_path: &PathBuf,
    log: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let mut runner = CommandRunner::new(config);
    if let Some(log) = log {
        runner = runner.with_log_path(log);
    }

    let mut bundle = ParameterBundle::new();
    for param in params {
        let (name, value) = parse_param(param)?;
        bundle.insert(name, value);
    }

    let mut task = NotebookTask::from_file(notebook, Arc::new(FsNotebookStore))?;
    for name in bundle.names() {
        if !task.param_names().iter().any(|declared| declared == name) {
            eprintln!("warning: '{name}' is not declared by the parameter cell");
        }
    }
    let status = task.run(&runner, &bundle)?;
    match status {
        RunStatus::Succeeded => println!("succeeded: {}", task.name()),
        RunStatus::Failed => {
            return Err(anyhow!("run failed: {} (see logs)", task.name()));
        }
    }
    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value)> {
    let (name, literal) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{raw}'"))?;
    let parsed: serde_yaml::Value = serde_yaml::from_str(literal)
        .with_context(|| format!("parse value for '{name}'"))?;
    let value = serde_json::to_value(parsed).with_context(|| format!("convert value for '{name}'"))?;
    Ok((name.to_string(), value))
}

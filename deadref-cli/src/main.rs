//! deadref CLI - dead declaration detector over serialized semantic models.
//!
//! Features:
//! - Loads a front-end-produced semantic model (JSON) and builds the
//!   whole-program declaration reference graph
//! - Dead declaration report in plain text or JSON
//! - Can-be-static / can-be-final modifier suggestions
//! - Graphviz DOT export of the reference graph
//! - Baseline snapshots with cross-run re-resolution by qualified name
//! - deadref.toml configuration (entry points, ignore patterns, output)

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use deadref_core::{
    init_structured_logging, load_config, print_json, print_plain, to_dot, Deadref, DeadrefConfig,
};

mod baseline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Dead declaration detector over semantic models")]
pub struct Cli {
    /// Path to the semantic model JSON file
    model: PathBuf,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Qualified names or patterns to ignore
    #[arg(long, num_args = 1..)]
    ignore: Vec<String>,

    /// Extra entry-point qualified names (kept alive even if unreferenced)
    #[arg(long, num_args = 1..)]
    entry: Vec<String>,

    /// Report unused parameters
    #[arg(long)]
    parameters: bool,

    /// Suppress can-be-static / can-be-final suggestions
    #[arg(long)]
    no_suggestions: bool,

    /// Generate Graphviz DOT output for the reference graph
    #[arg(long)]
    dot: bool,

    /// Write DOT output to a specified file instead of stdout
    #[arg(long, value_name = "FILE")]
    dot_file: Option<PathBuf>,

    /// Directory containing deadref.toml (defaults to the model's directory)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Write a baseline snapshot of the findings to this file
    #[arg(long, value_name = "FILE")]
    baseline_write: Option<PathBuf>,

    /// Compare findings against a previously written baseline
    #[arg(long, value_name = "FILE")]
    baseline_compare: Option<PathBuf>,

    /// Exit with status 1 if any dead declarations are found
    #[arg(long)]
    fail_on_dead: bool,
}

fn main() -> ExitCode {
    init_structured_logging();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_configuration(cli)?;

    let mut builder = Deadref::from_path(&cli.model)
        .with_context(|| format!("Failed to load model {}", cli.model.display()))?;
    if let Some(cfg) = &config {
        builder = builder.with_config(cfg);
    }
    builder = builder
        .entry_points(cli.entry.iter().cloned())
        .ignore_patterns(cli.ignore.iter().cloned());
    if cli.parameters {
        builder = builder.include_parameters(true);
    }
    if cli.no_suggestions {
        builder = builder
            .report_can_be_static(false)
            .report_can_be_final(false);
    }

    let result = builder.analyze().context("Analysis failed")?;

    if cli.dot || cli.dot_file.is_some() {
        let g = builder.graph();
        let dead_names: HashSet<String> = result.dead.iter().map(|d| d.name.clone()).collect();
        let dot = to_dot(&g, &dead_names);
        match &cli.dot_file {
            Some(path) => {
                fs::write(path, dot)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("DOT graph written to {}", path.display());
            }
            None => println!("{}", dot),
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(path) = &cli.baseline_write {
        baseline::write(path, &cli.model, &result)?;
        println!("Baseline written to {} ({} items)", path.display(), result.dead.len());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(path) = &cli.baseline_compare {
        let diff = baseline::compare(path, &cli.model, &builder, &result)?;
        print_baseline_diff(&diff);
        if cli.fail_on_dead && !diff.new_dead.is_empty() {
            return Ok(ExitCode::from(1));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let json = cli.json
        || config
            .as_ref()
            .and_then(|c| c.output.as_ref())
            .and_then(|o| o.format.as_deref())
            == Some("json");
    if json {
        print_json(&result);
    } else {
        print_plain(&result);
    }

    if cli.fail_on_dead && result.has_dead_code() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// Load deadref.toml from the configured directory or next to the model.
fn load_configuration(cli: &Cli) -> Result<Option<DeadrefConfig>> {
    let dir = cli
        .config_dir
        .clone()
        .or_else(|| cli.model.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(load_config(&dir)?)
}

fn print_baseline_diff(diff: &baseline::BaselineDiff) {
    if diff.model_changed {
        println!("Model changed since the baseline was written.");
    }
    println!(
        "Baseline comparison: {} new, {} still dead, {} fixed, {} stale",
        diff.new_dead.len(),
        diff.still_dead.len(),
        diff.fixed.len(),
        diff.stale.len()
    );
    if !diff.new_dead.is_empty() {
        println!("NEW DEAD ({}):", diff.new_dead.len());
        for item in &diff.new_dead {
            println!("- {} {} ({})", item.kind, item.name, item.reason);
        }
    }
    if !diff.fixed.is_empty() {
        println!("FIXED ({}):", diff.fixed.len());
        for item in &diff.fixed {
            println!("- {} {}", item.kind, item.name);
        }
    }
    if !diff.stale.is_empty() {
        println!("REMOVED DECLARATIONS ({}):", diff.stale.len());
        for item in &diff.stale {
            println!("- {} {}", item.kind, item.name);
        }
    }
}

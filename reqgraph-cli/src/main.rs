mod certdoc;
mod cli;
mod git;
mod ledger;
mod report;
mod scanner;
mod trace;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use reqgraph_core::{load_project_config, synchronize, ProjectConfig, ReqFilter, RequirementLevel};

use crate::cli::{Cli, Command, FilterArgs};
use crate::ledger::TaskLedger;
use crate::report::{print_nodes, GraphExport};
use crate::trace::Trace;

type Changeset = HashMap<String, serde_yaml::Value>;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let repo_root = match &cli.repo {
        Some(path) => path.clone(),
        None => git::repo_root(&env::current_dir()?)?,
    };
    let config = load_project_config(cli.config.as_deref(), &repo_root)?;
    log::debug!("Repository root: {}", repo_root.display());

    match &cli.command {
        Command::Check => handle_check(&repo_root, &config),
        Command::List { level, filter } => handle_list(&repo_root, &config, level, filter),
        Command::Dangling => handle_dangling(&repo_root, &config),
        Command::Changelists { id } => handle_changelists(&repo_root, &config, id),
        Command::Export { output } => handle_export(&repo_root, &config, output),
        Command::Sync { filter, ledger } => handle_sync(&repo_root, &config, filter, ledger),
    }
}

/// Builds the graph and fails unless it linked cleanly
fn linked_trace(repo_root: &Path, config: &ProjectConfig) -> Result<Trace> {
    let trace = trace::build(repo_root, config)?;
    if !trace.graph.is_linked() {
        trace.report.print();
        anyhow::bail!("Requirements could not be linked; run `reqgraph check` for details");
    }
    Ok(trace)
}

fn compile_filter(args: &FilterArgs) -> Result<ReqFilter> {
    let compile = |pattern: &Option<String>, what: &str| -> Result<Option<Regex>> {
        pattern
            .as_deref()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid {} pattern: {}", what, p)))
            .transpose()
    };

    Ok(ReqFilter {
        id: compile(&args.id, "ID")?,
        title: compile(&args.title, "title")?,
        body: compile(&args.body, "body")?,
    })
}

fn load_changeset(path: &Option<PathBuf>) -> Result<Option<Changeset>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read changeset: {:?}", path))?;
    let changeset: Changeset = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse changeset: {:?}", path))?;
    Ok(Some(changeset))
}

fn handle_check(repo_root: &Path, config: &ProjectConfig) -> Result<()> {
    let trace = trace::build(repo_root, config)?;
    let problems = trace.report.print();
    if problems > 0 {
        anyhow::bail!("{} problems found", problems);
    }

    println!(
        "{} {} requirements and {} code files checked.",
        "✓".green(),
        trace.graph.len() - trace.graph.code_files_by_position().len(),
        trace.graph.code_files_by_position().len()
    );
    Ok(())
}

fn handle_list(
    repo_root: &Path,
    config: &ProjectConfig,
    level: &Option<String>,
    filter: &FilterArgs,
) -> Result<()> {
    let level = level
        .as_deref()
        .map(|l| RequirementLevel::parse(l).with_context(|| format!("Invalid level: {}", l)))
        .transpose()?;
    let req_filter = compile_filter(filter)?;
    let changeset = load_changeset(&filter.changeset)?;

    let trace = linked_trace(repo_root, config)?;
    let nodes = trace.graph.filtered(level, &req_filter, changeset.as_ref());
    print_nodes(&nodes);
    Ok(())
}

fn handle_dangling(repo_root: &Path, config: &ProjectConfig) -> Result<()> {
    let trace = linked_trace(repo_root, config)?;
    let unreached = trace.graph.dangling_by_position()?;
    let untraced = trace.graph.untraced_by_position()?;
    log::info!(
        "{} unreached and {} untraced requirements",
        unreached.len(),
        untraced.len()
    );

    if unreached.is_empty() && untraced.is_empty() {
        println!("{}", "No dangling requirements.".green());
        return Ok(());
    }
    if !unreached.is_empty() {
        println!("{}", "Unreached requirements:".yellow().bold());
        print_nodes(&unreached);
    }
    if !untraced.is_empty() {
        println!("\n{}", "Requirements not traced to code:".yellow().bold());
        print_nodes(&untraced);
    }
    Ok(())
}

fn handle_changelists(repo_root: &Path, config: &ProjectConfig, id: &str) -> Result<()> {
    let trace = linked_trace(repo_root, config)?;
    let node = trace
        .graph
        .get(id)
        .with_context(|| format!("Requirement not found: {}", id))?;
    if node.level != RequirementLevel::Low {
        anyhow::bail!(
            "{} is a {} requirement; changelists are tracked for LOW requirements",
            id,
            node.level
        );
    }

    let paths = trace.graph.changelist_paths(node);
    if paths.is_empty() {
        println!("{}", "No code implements this requirement.".yellow());
        return Ok(());
    }

    let lists = git::changelists(repo_root, &paths)?;
    println!("{}: {}", "Requirement".blue(), node.id);
    println!("{}: {}", "Files".blue(), paths.join(", "));
    if lists.is_empty() {
        println!("{}", "(No changelists found)".dimmed());
    }
    for (name, url) in &lists {
        println!("  {:<10} {}", name.cyan(), url);
    }
    Ok(())
}

fn handle_export(repo_root: &Path, config: &ProjectConfig, output: &Option<PathBuf>) -> Result<()> {
    let trace = linked_trace(repo_root, config)?;
    let json = GraphExport::from_graph(&trace.graph).to_json()?;

    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            println!(
                "{} Exported {} nodes to {}",
                "✓".green(),
                trace.graph.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn handle_sync(
    repo_root: &Path,
    config: &ProjectConfig,
    filter: &FilterArgs,
    ledger_path: &Option<PathBuf>,
) -> Result<()> {
    let req_filter = compile_filter(filter)?;
    let changeset = load_changeset(&filter.changeset)?;
    let trace = linked_trace(repo_root, config)?;

    let selected: Option<HashSet<String>> = if req_filter.is_empty() && changeset.is_none() {
        None
    } else {
        Some(
            trace
                .graph
                .filtered(None, &req_filter, changeset.as_ref())
                .into_iter()
                .map(|n| n.id.clone())
                .collect(),
        )
    };

    let path = ledger_path
        .clone()
        .unwrap_or_else(|| repo_root.join(&config.ledger_path));
    let mut ledger = TaskLedger::open(&path)?;
    let summary = synchronize(
        &trace.graph,
        &mut ledger,
        &config.project_name,
        selected.as_ref(),
    )?;
    ledger.save()?;

    println!("{} Task ledger {} synchronized", "✓".green(), path.display());
    println!("  Created:     {}", summary.created.len());
    println!("  Updated:     {}", summary.updated.len());
    println!("  Invalidated: {}", summary.invalidated.len());
    if summary.skipped > 0 {
        println!("  {}", format!("Skipped:     {}", summary.skipped).dimmed());
    }
    Ok(())
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::collections::BTreeMap;

use reqgraph_core::{Node, ReqGraph, RequirementLevel, RequirementStatus, TraceError};

fn status_label(status: RequirementStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        RequirementStatus::NotStarted => label.red(),
        RequirementStatus::Started => label.yellow(),
        RequirementStatus::Completed => label.green(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Prints a titled list of problems; returns how many there were
pub fn print_problems<'a, I>(heading: &str, problems: I) -> usize
where
    I: IntoIterator<Item = &'a TraceError>,
{
    let messages: Vec<String> = problems.into_iter().map(|e| e.to_string()).collect();
    print_messages(heading, &messages)
}

pub fn print_messages(heading: &str, messages: &[String]) -> usize {
    if messages.is_empty() {
        return 0;
    }
    println!("{} ({})", heading.red().bold(), messages.len());
    for message in messages {
        println!("  {} {}", "!".red(), message);
    }
    messages.len()
}

/// Prints requirements as a table
pub fn print_nodes(nodes: &[&Node]) {
    if nodes.is_empty() {
        println!("{}", "No requirements found.".yellow());
        return;
    }

    println!(
        "{:<24} | {:<6} | {:<40} | {:<11} | {:<30}",
        "ID", "Level", "Title", "Status", "Path"
    );
    println!("{}", "-".repeat(125));

    for node in nodes {
        let title = if node.is_code() {
            "-".to_string()
        } else {
            truncate(node.title(), 40)
        };
        println!(
            "{:<24} | {:<6} | {:<40} | {:<11} | {:<30}",
            truncate(&node.id, 24),
            node.level.to_string(),
            title,
            status_label(node.status()),
            node.path
        );
    }
}

#[derive(Debug, Serialize)]
pub struct NodeExport {
    pub id: String,
    pub level: RequirementLevel,
    pub path: String,
    pub position: usize,
    pub title: String,
    pub body: String,
    pub status: RequirementStatus,
    pub deleted: bool,
    pub reached: bool,
    pub traced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct GraphExport {
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<NodeExport>,
}

impl GraphExport {
    /// Snapshot of every node, each level ordered by position
    pub fn from_graph(graph: &ReqGraph) -> Self {
        let levels = [
            RequirementLevel::System,
            RequirementLevel::High,
            RequirementLevel::Low,
            RequirementLevel::Code,
        ];
        let nodes = levels
            .iter()
            .flat_map(|&level| graph.nodes_by_level(level))
            .map(|node| NodeExport {
                id: node.id.clone(),
                level: node.level,
                path: node.path.clone(),
                position: node.position,
                title: node.title().to_string(),
                body: node.body_without_title().to_string(),
                status: node.status(),
                deleted: node.is_deleted(),
                reached: node.reached(),
                traced: node.traced(),
                file_hash: node.file_hash.clone(),
                parents: graph.parents_of(node).map(|p| p.id.clone()).collect(),
                children: graph.children_of(node).map(|c| c.id.clone()).collect(),
                attributes: node.attributes.clone(),
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            nodes,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

//! Ordered and filtered views of a resolved graph
//!
//! Every listing is sorted by position before it is returned; the order in
//! which nodes were ingested is never exposed.

use regex::Regex;
use std::collections::HashMap;

use crate::error::GraphError;
use crate::graph::ReqGraph;
use crate::models::{Node, RequirementLevel};

/// Conjunction of optional patterns over a node's ID, title and body
#[derive(Debug, Clone, Default)]
pub struct ReqFilter {
    pub id: Option<Regex>,
    pub title: Option<Regex>,
    pub body: Option<Regex>,
}

impl ReqFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, pattern: Regex) -> Self {
        self.id = Some(pattern);
        self
    }

    pub fn with_title(mut self, pattern: Regex) -> Self {
        self.title = Some(pattern);
        self
    }

    pub fn with_body(mut self, pattern: Regex) -> Self {
        self.body = Some(pattern);
        self
    }

    /// True when no pattern is set
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.title.is_none() && self.body.is_none()
    }
}

impl Node {
    /// Returns true if the node matches every pattern of the filter and,
    /// when a changeset is given, its ID is one of the changeset's keys.
    pub fn matches<V>(&self, filter: &ReqFilter, changeset: Option<&HashMap<String, V>>) -> bool {
        if let Some(re) = &filter.id {
            if !re.is_match(&self.id) {
                return false;
            }
        }
        if let Some(re) = &filter.title {
            if !re.is_match(self.title()) {
                return false;
            }
        }
        if let Some(re) = &filter.body {
            if !re.is_match(&self.body) {
                return false;
            }
        }
        match changeset {
            Some(changes) => changes.contains_key(&self.id),
            None => true,
        }
    }
}

fn by_position<'a>(nodes: impl Iterator<Item = &'a Node>) -> Vec<&'a Node> {
    let mut nodes: Vec<&Node> = nodes.collect();
    nodes.sort_by_key(|n| n.position);
    nodes
}

impl ReqGraph {
    /// All nodes of one level, by position
    pub fn nodes_by_level(&self, level: RequirementLevel) -> Vec<&Node> {
        by_position(self.nodes().filter(|n| n.level == level))
    }

    /// The top-level requirements, by position
    pub fn systems_by_position(&self) -> Vec<&Node> {
        self.nodes_by_level(RequirementLevel::System)
    }

    pub fn code_files_by_position(&self) -> Vec<&Node> {
        self.nodes_by_level(RequirementLevel::Code)
    }

    /// Nodes that neither traversal reached
    pub fn dangling_by_position(&self) -> Result<Vec<&Node>, GraphError> {
        if !self.is_linked() {
            return Err(GraphError::NotLinked);
        }
        Ok(by_position(self.nodes().filter(|n| !n.reached())))
    }

    /// Requirements with no path down to any code file
    pub fn untraced_by_position(&self) -> Result<Vec<&Node>, GraphError> {
        if !self.is_linked() {
            return Err(GraphError::NotLinked);
        }
        Ok(by_position(
            self.nodes().filter(|n| !n.is_code() && !n.traced()),
        ))
    }

    /// Nodes of an optional level matching a filter and changeset, by position
    pub fn filtered<V>(
        &self,
        level: Option<RequirementLevel>,
        filter: &ReqFilter,
        changeset: Option<&HashMap<String, V>>,
    ) -> Vec<&Node> {
        by_position(self.nodes().filter(|n| {
            level.map_or(true, |l| n.level == l) && n.matches(filter, changeset)
        }))
    }

    /// Paths of the code files implementing a low-level requirement.
    ///
    /// Used to look up the change lists that touched the requirement's code.
    pub fn changelist_paths(&self, node: &Node) -> Vec<String> {
        if node.level != RequirementLevel::Low {
            return Vec::new();
        }
        self.children_of(node)
            .filter(|c| c.is_code())
            .map(|c| c.path.clone())
            .collect()
    }
}

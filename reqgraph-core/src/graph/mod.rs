//! The requirement traceability graph
//!
//! A `ReqGraph` owns every node. Parent and child links are `NodeId`s into
//! the same arena, so the graph is the only owner and links never dangle.
//!
//! A graph goes through its phases exactly once:
//! 1. ingestion (`add_requirement`, `add_code_file`, `ingest`)
//! 2. linking (`resolve`), which on success also propagates status
//! 3. read-only queries, validation and synchronization

mod link;
mod propagate;

use std::collections::HashMap;

use crate::error::{GraphError, TraceError};
use crate::models::{Node, NodeId, RequirementLevel, BODY_ATTRIBUTE};
use crate::source::{CodeReferences, RawRequirement};

/// Where the graph is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphPhase {
    Ingesting,
    Linked,
    LinkFailed,
}

/// Requirement and code-file nodes keyed by ID or path
#[derive(Debug)]
pub struct ReqGraph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    phase: GraphPhase,
}

impl ReqGraph {
    /// Creates an empty graph ready for ingestion
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            phase: GraphPhase::Ingesting,
        }
    }

    pub fn phase(&self) -> GraphPhase {
        self.phase
    }

    pub fn is_linked(&self) -> bool {
        self.phase == GraphPhase::Linked
    }

    fn ensure_ingesting(&self) -> Result<(), GraphError> {
        if self.phase == GraphPhase::Ingesting {
            Ok(())
        } else {
            Err(GraphError::Sealed)
        }
    }

    /// Adds a requirement record.
    ///
    /// Fails if the ID is already defined, naming both documents, or if the
    /// record's type tag does not map to a level.
    pub fn add_requirement(&mut self, record: RawRequirement) -> Result<(), TraceError> {
        self.ensure_ingesting()?;

        if let Some(&existing) = self.index.get(&record.id) {
            return Err(TraceError::DuplicateIdentifier {
                id: record.id,
                path: record.path,
                prior_path: self.nodes[existing.0].path.clone(),
            });
        }

        let level = match RequirementLevel::from_type(&record.req_type) {
            Some(level) if level != RequirementLevel::Code => level,
            _ => {
                return Err(TraceError::UnknownRequirementType {
                    id: record.id,
                    path: record.path,
                    req_type: record.req_type,
                })
            }
        };

        let RawRequirement {
            id,
            parents,
            attributes,
            body,
            position,
            path,
            ..
        } = record;

        // Title and body are a view over the text, not a declared attribute
        let mut attributes: std::collections::BTreeMap<String, String> = attributes
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        let text = attributes.remove(BODY_ATTRIBUTE);

        let mut node = Node::new(id.clone(), level, path);
        node.parent_ids = parents;
        node.body = if body.is_empty() {
            text.unwrap_or_default()
        } else {
            body
        };
        node.attributes = attributes;
        node.position = position;

        self.insert(id, node);
        Ok(())
    }

    /// Adds a code file keyed by its path.
    ///
    /// Files without any requirement references are not part of the graph
    /// and are ignored. Scanning the same path again replaces the earlier node.
    pub fn add_code_file(&mut self, refs: CodeReferences) -> Result<(), GraphError> {
        self.ensure_ingesting()?;

        if refs.requirement_ids.is_empty() {
            return Ok(());
        }

        let mut node = Node::new(refs.path.clone(), RequirementLevel::Code, refs.path.clone());
        node.file_hash = Some(refs.hash);
        node.parent_ids = refs.requirement_ids;

        match self.index.get(&refs.path) {
            Some(&existing) => self.nodes[existing.0] = node,
            None => self.insert(refs.path, node),
        }
        Ok(())
    }

    /// Adds every record, collecting the ones that were rejected
    pub fn ingest<I>(&mut self, records: I) -> Vec<TraceError>
    where
        I: IntoIterator<Item = RawRequirement>,
    {
        let mut errors = Vec::new();
        for record in records {
            if let Err(e) = self.add_requirement(record) {
                errors.push(e);
            }
        }
        log::debug!("Ingested {} nodes, {} rejected", self.nodes.len(), errors.len());
        errors
    }

    fn insert(&mut self, key: String, node: Node) {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.index.insert(key, id);
    }

    /// Looks up a node by requirement ID or code file path
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.index.get(key).map(|id| &self.nodes[id.0])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in ingestion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Resolved parents of a node, ordered by position
    pub fn parents_of<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.parents.iter().map(move |id| &self.nodes[id.0])
    }

    /// Resolved children of a node, ordered by position
    pub fn children_of<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Node> + 'a {
        node.children.iter().map(move |id| &self.nodes[id.0])
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }
}

impl Default for ReqGraph {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Attribute holding the requirement text; becomes the node body on ingestion
pub const BODY_ATTRIBUTE: &str = "TEXT";

/// Attribute listing the declared parents of a requirement
pub const PARENTS_ATTRIBUTE: &str = "PARENTS";

/// Title prefix marking a superseded requirement
pub const DELETED_PREFIX: &str = "DELETED";

/// Shape of a requirement identifier: `REQ-<digits>-<project>-<type>-<digits>`
pub const REQ_ID_PATTERN: &str = r"REQ-\d+-\w+-(SYS|SWH|HWH|SWL|HWL)-\d+";

static REQ_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}$", REQ_ID_PATTERN)).expect("valid id pattern"));

/// The four levels of the requirement graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequirementLevel {
    System,
    High,
    Low,
    Code,
}

impl RequirementLevel {
    /// Maps a requirement type tag (as found in the ID) to its level
    pub fn from_type(req_type: &str) -> Option<Self> {
        match req_type {
            "SYS" => Some(RequirementLevel::System),
            "SWH" | "HWH" => Some(RequirementLevel::High),
            "SWL" | "HWL" => Some(RequirementLevel::Low),
            _ => None,
        }
    }

    /// Parse a level name as typed on the command line
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "system" | "sys" => Some(RequirementLevel::System),
            "high" | "hlr" => Some(RequirementLevel::High),
            "low" | "llr" => Some(RequirementLevel::Low),
            "code" => Some(RequirementLevel::Code),
            _ => None,
        }
    }
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementLevel::System => write!(f, "SYSTEM"),
            RequirementLevel::High => write!(f, "HIGH"),
            RequirementLevel::Low => write!(f, "LOW"),
            RequirementLevel::Code => write!(f, "CODE"),
        }
    }
}

/// Completion status computed by the downward traversal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RequirementStatus {
    /// No children, and not a code file
    #[default]
    NotStarted,
    /// Has children, but not every child is completed
    Started,
    /// Every path below ends in code
    Completed,
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementStatus::NotStarted => write!(f, "NOT STARTED"),
            RequirementStatus::Started => write!(f, "STARTED"),
            RequirementStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Returns the type tag (SYS, SWH, SWL, ...) of a well-formed requirement ID
pub fn requirement_type(id: &str) -> Option<&str> {
    REQ_ID
        .captures(id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Checks that an ID has the `REQ-<digits>-<project>-<type>-<digits>` shape
pub fn is_requirement_id(id: &str) -> bool {
    REQ_ID.is_match(id)
}

/// Index of a node inside its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// A requirement or code file in the traceability graph.
///
/// Declared data is public. Links, markers and status are derived by the
/// graph and can only be read here.
#[derive(Debug, Clone)]
pub struct Node {
    /// Requirement ID, or the repository-relative path for code files
    pub id: String,
    pub level: RequirementLevel,
    /// Document or code file this node was found in, relative to the repository root
    pub path: String,
    /// Git blob hash of the file contents (code files only)
    pub file_hash: Option<String>,
    pub parent_ids: Vec<String>,
    pub body: String,
    /// Declared attributes with upper-cased keys
    pub attributes: BTreeMap<String, String>,
    pub position: usize,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) reached: bool,
    pub(crate) traced: bool,
    pub(crate) status: RequirementStatus,
}

impl Node {
    pub(crate) fn new(id: String, level: RequirementLevel, path: String) -> Self {
        Self {
            id,
            level,
            path,
            file_hash: None,
            parent_ids: Vec::new(),
            body: String::new(),
            attributes: BTreeMap::new(),
            position: 0,
            parents: Vec::new(),
            children: Vec::new(),
            reached: false,
            traced: false,
            status: RequirementStatus::NotStarted,
        }
    }

    /// First line of the body
    pub fn title(&self) -> &str {
        self.body.lines().next().unwrap_or("").trim()
    }

    /// Everything after the first line of the body
    pub fn body_without_title(&self) -> &str {
        match self.body.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        }
    }

    /// Superseded requirements keep their ID but carry a `DELETED` title
    pub fn is_deleted(&self) -> bool {
        self.title().starts_with(DELETED_PREFIX)
    }

    pub fn is_code(&self) -> bool {
        self.level == RequirementLevel::Code
    }

    /// Looks up a declared attribute, case-insensitively
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_uppercase())
            .map(|v| v.as_str())
    }

    pub fn status(&self) -> RequirementStatus {
        self.status
    }

    /// Set when any traversal visited this node
    pub fn reached(&self) -> bool {
        self.reached
    }

    /// Set when this node lies on a path up from a code file
    pub fn traced(&self) -> bool {
        self.traced
    }

    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

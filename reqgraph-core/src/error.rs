//! Diagnostics reported while building and validating the graph
//!
//! Every defect is a structured `TraceError`. Phases that can find several
//! defects at once return them together as `Diagnostics`; rendering to text
//! is left to the caller.

use std::fmt;
use thiserror::Error;

/// The node that declared a broken parent reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Referrer {
    /// A requirement, by ID
    Requirement(String),
    /// A code file, by repository-relative path
    CodeFile(String),
}

impl Referrer {
    /// The requirement ID or file path
    pub fn key(&self) -> &str {
        match self {
            Referrer::Requirement(id) => id,
            Referrer::CodeFile(path) => path,
        }
    }
}

impl fmt::Display for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referrer::Requirement(id) => write!(f, "parent of requirement {}", id),
            Referrer::CodeFile(path) => write!(f, "reference in file {}", path),
        }
    }
}

/// Kinds of `TraceError`, for matching without inspecting fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateIdentifier,
    UnknownRequirementType,
    MissingParent,
    UnresolvedParent,
    SupersededParentReference,
    InvalidParentLevel,
    UnresolvedCrossReference,
    SupersededCrossReference,
    SchemaAttributeMissing,
    SchemaAttributeInvalid,
    InvalidSchemaPattern,
    MalformedSourcePath,
    Source,
    Graph,
}

/// Misuse of the graph's phase ordering
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Graph is already linked; no more records can be added")]
    Sealed,

    #[error("Graph has already been resolved")]
    AlreadyLinked,

    #[error("Graph has not been linked successfully")]
    NotLinked,
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Requirement {id} in {path} already defined in {prior_path}")]
    DuplicateIdentifier {
        id: String,
        path: String,
        prior_path: String,
    },

    #[error("Requirement {id} in {path} has unknown type '{req_type}'")]
    UnknownRequirementType {
        id: String,
        path: String,
        req_type: String,
    },

    #[error("Requirement {id} in file {path} has no parents.")]
    MissingParent { id: String, path: String },

    #[error("Invalid {referrer}: {parent} does not exist.")]
    UnresolvedParent { referrer: Referrer, parent: String },

    #[error("Invalid {referrer}: {parent} is deleted.")]
    SupersededParentReference { referrer: Referrer, parent: String },

    #[error("Invalid {referrer}: {parent} is not at a higher level.")]
    InvalidParentLevel { referrer: Referrer, parent: String },

    #[error("Invalid reference to inexistent requirement {id} in {path}:{line}")]
    UnresolvedCrossReference { id: String, path: String, line: usize },

    #[error("Invalid reference to deleted requirement {id} in {path}:{line}")]
    SupersededCrossReference { id: String, path: String, line: usize },

    #[error("Requirement '{id}' is missing attribute '{attribute}'.")]
    SchemaAttributeMissing { id: String, attribute: String },

    #[error(
        "Requirement '{id}' has invalid value '{value}' in attribute '{attribute}'. \
         Expected {pattern}."
    )]
    SchemaAttributeInvalid {
        id: String,
        attribute: String,
        value: String,
        pattern: String,
    },

    #[error("Attribute '{attribute}' has an invalid value pattern '{pattern}': {source}")]
    InvalidSchemaPattern {
        attribute: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Malformed code file path {path}: not inside {root}")]
    MalformedSourcePath { path: String, root: String },

    #[error("Failed to read documents: {0}")]
    Source(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl TraceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TraceError::DuplicateIdentifier { .. } => ErrorKind::DuplicateIdentifier,
            TraceError::UnknownRequirementType { .. } => ErrorKind::UnknownRequirementType,
            TraceError::MissingParent { .. } => ErrorKind::MissingParent,
            TraceError::UnresolvedParent { .. } => ErrorKind::UnresolvedParent,
            TraceError::SupersededParentReference { .. } => ErrorKind::SupersededParentReference,
            TraceError::InvalidParentLevel { .. } => ErrorKind::InvalidParentLevel,
            TraceError::UnresolvedCrossReference { .. } => ErrorKind::UnresolvedCrossReference,
            TraceError::SupersededCrossReference { .. } => ErrorKind::SupersededCrossReference,
            TraceError::SchemaAttributeMissing { .. } => ErrorKind::SchemaAttributeMissing,
            TraceError::SchemaAttributeInvalid { .. } => ErrorKind::SchemaAttributeInvalid,
            TraceError::InvalidSchemaPattern { .. } => ErrorKind::InvalidSchemaPattern,
            TraceError::MalformedSourcePath { .. } => ErrorKind::MalformedSourcePath,
            TraceError::Source(_) => ErrorKind::Source,
            TraceError::Graph(_) => ErrorKind::Graph,
        }
    }
}

/// All defects found by one phase
#[derive(Debug, Default)]
pub struct Diagnostics(pub Vec<TraceError>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: TraceError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TraceError> {
        self.0.iter()
    }

    /// Number of diagnostics of the given kind
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.0.iter().filter(|e| e.kind() == kind).count()
    }

    /// `Ok` when nothing was reported
    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<TraceError>> for Diagnostics {
    fn from(errors: Vec<TraceError>) -> Self {
        Self(errors)
    }
}

impl From<GraphError> for Diagnostics {
    fn from(error: GraphError) -> Self {
        Self(vec![TraceError::Graph(error)])
    }
}

impl IntoIterator for Diagnostics {
    type Item = TraceError;
    type IntoIter = std::vec::IntoIter<TraceError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.0 {
            writeln!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

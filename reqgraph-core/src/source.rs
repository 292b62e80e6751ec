//! Records supplied by the document and code collaborators
//!
//! The graph never reads files itself. Document readers hand over
//! `RawRequirement`s, code scanners hand over `CodeReferences`, and the
//! cross-reference pass pulls raw text through a `DocumentSource`.

use std::collections::BTreeMap;

use crate::error::TraceError;

/// A requirement as parsed from a certification document
#[derive(Debug, Clone, Default)]
pub struct RawRequirement {
    pub id: String,
    /// Type tag, e.g. SYS, SWH or SWL
    pub req_type: String,
    pub parents: Vec<String>,
    /// Attribute table; may still contain the `TEXT` attribute
    pub attributes: BTreeMap<String, String>,
    pub body: String,
    /// Ordinal of the record within its document
    pub position: usize,
    /// Document path, relative to the repository root
    pub path: String,
}

impl RawRequirement {
    /// Builds a record whose type tag is taken from the ID
    pub fn new(id: impl Into<String>, path: impl Into<String>, position: usize) -> Self {
        let id = id.into();
        let req_type = crate::models::requirement_type(&id)
            .unwrap_or_default()
            .to_string();
        Self {
            id,
            req_type,
            position,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// The requirement references found in one source file
#[derive(Debug, Clone)]
pub struct CodeReferences {
    /// Repository-relative path; doubles as the node key
    pub path: String,
    /// Git blob hash of the file contents
    pub hash: String,
    pub requirement_ids: Vec<String>,
}

/// Raw text of one certification document
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub text: String,
}

/// Supplies the raw text of every certification document
pub trait DocumentSource {
    fn documents(&self) -> Result<Vec<SourceDocument>, TraceError>;
}

impl DocumentSource for Vec<SourceDocument> {
    fn documents(&self) -> Result<Vec<SourceDocument>, TraceError> {
        Ok(self.clone())
    }
}

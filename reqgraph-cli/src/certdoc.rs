//! YAML certification documents
//!
//! Each document lists its requirements in order:
//!
//! ```yaml
//! requirements:
//!   - id: REQ-0-DDLN-SWH-001
//!     text: |
//!       Title line
//!       Body text
//!     attributes:
//!       Rationale: ...
//!       Parents: REQ-0-DDLN-SYS-001, REQ-0-DDLN-SYS-002
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use reqgraph_core::{
    is_requirement_id, requirement_type, DocumentSource, RawRequirement, SourceDocument,
    TraceError, BODY_ATTRIBUTE, PARENTS_ATTRIBUTE, REQ_ID_PATTERN,
};

#[derive(Debug, Deserialize)]
struct CertDoc {
    #[serde(default)]
    requirements: Vec<CertDocRecord>,
}

#[derive(Debug, Deserialize)]
struct CertDocRecord {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attributes: BTreeMap<String, serde_yaml::Value>,
}

/// Renders a scalar attribute value as text
fn value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

/// Parses one document into requirement records.
///
/// `path` is the document path relative to the repository root; it is
/// recorded on every requirement. Positions are the record indices.
pub fn parse_certdoc(path: &str, content: &str) -> Result<Vec<RawRequirement>> {
    let doc: CertDoc =
        serde_yaml::from_str(content).with_context(|| format!("Error parsing {}", path))?;
    let id_pattern = Regex::new(REQ_ID_PATTERN)?;

    let mut records = Vec::with_capacity(doc.requirements.len());
    for (position, record) in doc.requirements.into_iter().enumerate() {
        if !is_requirement_id(&record.id) {
            anyhow::bail!(
                "Error parsing {}: requirement #{} has malformed ID '{}'",
                path,
                position + 1,
                record.id
            );
        }

        let mut attributes: BTreeMap<String, String> = record
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect();

        let parents = attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(PARENTS_ATTRIBUTE))
            .map(|(_, v)| {
                id_pattern
                    .find_iter(v)
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        // The parser hands the text over as an attribute, like any other field
        attributes.insert(BODY_ATTRIBUTE.to_string(), record.text.trim_end().to_string());

        records.push(RawRequirement {
            req_type: requirement_type(&record.id).unwrap_or_default().to_string(),
            id: record.id,
            parents,
            attributes,
            body: String::new(),
            position,
            path: path.to_string(),
        });
    }

    Ok(records)
}

/// The certification documents of a repository
pub struct CertDocs {
    root: PathBuf,
    dir: PathBuf,
}

impl CertDocs {
    pub fn new<P: AsRef<Path>>(root: P, certdoc_path: &Path) -> Self {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(certdoc_path);
        Self { root, dir }
    }

    /// Document files, sorted by name
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let is_yaml = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
                        .unwrap_or(false);
                    if entry.file_type().is_file() && is_yaml {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }
        log::info!("Found {} certification documents", files.len());
        files
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Parses every document, collecting the ones that could not be read
    pub fn records(&self) -> (Vec<RawRequirement>, Vec<String>) {
        let mut records = Vec::new();
        let mut problems = Vec::new();

        for file in self.files() {
            let rel = self.relative(&file);
            let parsed = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", rel))
                .and_then(|content| parse_certdoc(&rel, &content));
            match parsed {
                Ok(mut recs) => records.append(&mut recs),
                Err(e) => problems.push(format!("Problems found while parsing {}: {:#}", rel, e)),
            }
        }

        (records, problems)
    }
}

impl DocumentSource for CertDocs {
    fn documents(&self) -> Result<Vec<SourceDocument>, TraceError> {
        self.files()
            .into_iter()
            .map(|file| {
                let text = fs::read_to_string(&file)
                    .map_err(|e| TraceError::Source(format!("{}: {}", file.display(), e)))?;
                Ok(SourceDocument {
                    path: self.relative(&file),
                    text,
                })
            })
            .collect()
    }
}

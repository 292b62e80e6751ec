//! Attribute schema and free-text cross-reference checks
//!
//! Both checks are independent of linking and status: they report defects
//! alongside a resolved graph rather than blocking it.

use regex::Regex;

use crate::config::AttributeRule;
use crate::error::{Diagnostics, GraphError, TraceError};
use crate::graph::{GraphPhase, ReqGraph};
use crate::models::{Node, RequirementLevel, PARENTS_ATTRIBUTE, REQ_ID_PATTERN};
use crate::source::DocumentSource;

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    key: String,
    pattern: Option<(String, Regex)>,
}

/// Ordered attribute rules with their value patterns compiled
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    rules: Vec<CompiledRule>,
}

impl AttributeSchema {
    /// Compiles every value pattern, failing on the first invalid one
    pub fn compile(rules: &[AttributeRule]) -> Result<Self, TraceError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let pattern = match &rule.value {
                Some(p) => {
                    let re = Regex::new(p).map_err(|source| TraceError::InvalidSchemaPattern {
                        attribute: rule.name.clone(),
                        pattern: p.clone(),
                        source,
                    })?;
                    Some((p.clone(), re))
                }
                None => None,
            };
            compiled.push(CompiledRule {
                name: rule.name.clone(),
                key: rule.name.to_uppercase(),
                pattern,
            });
        }
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks one requirement's attributes against every rule
    pub fn check(&self, node: &Node) -> Vec<TraceError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            match node.attributes.get(&rule.key) {
                None => {
                    // SYSTEM requirements have no parents to declare
                    let exempt =
                        node.level == RequirementLevel::System && rule.key == PARENTS_ATTRIBUTE;
                    if !exempt {
                        errors.push(TraceError::SchemaAttributeMissing {
                            id: node.id.clone(),
                            attribute: rule.name.clone(),
                        });
                    }
                }
                Some(value) => {
                    if let Some((source, re)) = &rule.pattern {
                        if !re.is_match(value) {
                            errors.push(TraceError::SchemaAttributeInvalid {
                                id: node.id.clone(),
                                attribute: rule.key.clone(),
                                value: value.clone(),
                                pattern: source.clone(),
                            });
                        }
                    }
                }
            }
        }
        errors
    }
}

/// Line patterns used when scanning raw document text
#[derive(Debug, Clone)]
pub struct CrossReferenceRules {
    /// A requirement ID anywhere in a line
    pub reference: Regex,
    /// A line declaring parents inline; those are checked by the linker
    pub parents_line: Regex,
    /// A parents key with no inline value, opening a block list
    pub parents_block: Regex,
    /// An item of a parents block list
    pub block_item: Regex,
    /// A line declaring a requirement's own ID
    pub declaration_line: Regex,
}

impl Default for CrossReferenceRules {
    fn default() -> Self {
        Self {
            reference: Regex::new(REQ_ID_PATTERN).expect("valid id pattern"),
            parents_line: Regex::new(r"(?i)parents:\s*\[?\s*REQ-")
                .expect("valid parents pattern"),
            parents_block: Regex::new(r"(?i)^\s*parents:\s*$").expect("valid block pattern"),
            block_item: Regex::new(r"^\s*-\s+REQ-").expect("valid item pattern"),
            declaration_line: Regex::new(r"^\s*(-\s*)?id:\s*REQ-")
                .expect("valid declaration pattern"),
        }
    }
}

impl ReqGraph {
    /// Validates the attributes of every requirement against the schema
    pub fn check_attributes(&self, schema: &AttributeSchema) -> Vec<TraceError> {
        self.nodes()
            .filter(|n| !n.is_code())
            .flat_map(|n| schema.check(n))
            .collect()
    }

    /// Scans raw document text for requirement IDs that are unknown, or that
    /// name a deleted requirement outside a parents or declaration line.
    ///
    /// Ingestion must be finished; the link result does not matter.
    pub fn check_cross_references(
        &self,
        source: &dyn DocumentSource,
        rules: &CrossReferenceRules,
    ) -> Result<(), Diagnostics> {
        if self.phase() == GraphPhase::Ingesting {
            return Err(GraphError::NotLinked.into());
        }

        let documents = source
            .documents()
            .map_err(|e| Diagnostics::from(vec![e]))?;
        let mut diagnostics = Diagnostics::new();

        for doc in &documents {
            let mut in_parents_block = false;
            for (index, line) in doc.text.lines().enumerate() {
                in_parents_block = in_parents_block && rules.block_item.is_match(line);
                let excused = in_parents_block
                    || rules.parents_line.is_match(line)
                    || rules.declaration_line.is_match(line);
                if rules.parents_block.is_match(line) {
                    in_parents_block = true;
                }
                for m in rules.reference.find_iter(line) {
                    let id = m.as_str();
                    match self.get(id) {
                        None => diagnostics.push(TraceError::UnresolvedCrossReference {
                            id: id.to_string(),
                            path: doc.path.clone(),
                            line: index + 1,
                        }),
                        Some(node) if node.is_deleted() && !excused => {
                            diagnostics.push(TraceError::SupersededCrossReference {
                                id: id.to_string(),
                                path: doc.path.clone(),
                                line: index + 1,
                            })
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        log::debug!(
            "Scanned {} documents for cross references, {} problems",
            documents.len(),
            diagnostics.len()
        );
        diagnostics.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::graph::tests::{req, HLR, LLR, SYS};
    use crate::source::SourceDocument;

    fn rules(specs: &[(&str, Option<&str>)]) -> Vec<AttributeRule> {
        specs
            .iter()
            .map(|(name, value)| AttributeRule {
                name: name.to_string(),
                value: value.map(str::to_string),
            })
            .collect()
    }

    fn graph() -> ReqGraph {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]).with_attribute("Rationale", "Top"),
            req(HLR, 1, &[SYS])
                .with_attribute("Parents", SYS)
                .with_attribute("Rationale", "Because")
                .with_attribute("Verification", "Test"),
            req(LLR, 2, &[HLR])
                .with_attribute("Parents", HLR)
                .with_attribute("Verification", "Guesswork"),
            req("REQ-0-DDLN-SWH-002", 3, &[SYS]).with_body("DELETED Superseded"),
        ]);
        graph
    }

    #[test]
    fn test_missing_and_invalid_attributes() {
        let graph = graph();
        let schema = AttributeSchema::compile(&rules(&[
            ("Parents", None),
            ("Rationale", None),
            ("Verification", Some("^(Test|Inspection|Analysis|Demonstration)$")),
        ]))
        .unwrap();
        assert_eq!(schema.len(), 3);

        let errors = graph.check_attributes(&schema);
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

        assert!(messages.contains(&format!(
            "Requirement '{}' is missing attribute 'Rationale'.",
            LLR
        )));
        assert!(messages.contains(&format!(
            "Requirement '{}' has invalid value 'Guesswork' in attribute 'VERIFICATION'. \
             Expected ^(Test|Inspection|Analysis|Demonstration)$.",
            LLR
        )));
        // SYSTEM may omit Parents but not Verification
        assert!(!messages.iter().any(|m| m.contains(SYS) && m.contains("Parents")));
        assert!(messages
            .iter()
            .any(|m| m.contains(SYS) && m.contains("Verification")));
        assert!(errors.iter().all(|e| matches!(
            e.kind(),
            ErrorKind::SchemaAttributeMissing | ErrorKind::SchemaAttributeInvalid
        )));
    }

    #[test]
    fn test_code_files_are_not_checked() {
        let mut graph = ReqGraph::new();
        graph
            .add_code_file(crate::graph::tests::code("src/main.c", &[LLR]))
            .unwrap();
        let schema = AttributeSchema::compile(&rules(&[("Rationale", None)])).unwrap();
        assert!(graph.check_attributes(&schema).is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = AttributeSchema::compile(&rules(&[("Verification", Some("(unclosed"))]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchemaPattern);
        assert!(err.to_string().contains("Verification"));
    }

    fn doc(text: &str) -> Vec<SourceDocument> {
        vec![SourceDocument {
            path: "certdocs/reqs.yaml".to_string(),
            text: text.to_string(),
        }]
    }

    #[test]
    fn test_cross_reference_to_unknown_requirement() {
        let mut graph = graph();
        let _ = graph.resolve();

        let text = format!("- id: {}\n  text: See REQ-0-DDLN-SWH-404 for details\n", HLR);
        let diags = graph
            .check_cross_references(&doc(&text), &CrossReferenceRules::default())
            .unwrap_err();
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.to_string(),
            "Invalid reference to inexistent requirement REQ-0-DDLN-SWH-404 \
             in certdocs/reqs.yaml:2\n"
        );
    }

    #[test]
    fn test_cross_reference_to_deleted_requirement() {
        let mut graph = graph();
        let _ = graph.resolve();

        let text = "\
- id: REQ-0-DDLN-SWH-002
  text: DELETED Superseded
  attributes:
    Parents: REQ-0-DDLN-SWH-002
- id: REQ-0-DDLN-SWL-009
  text: Replaces REQ-0-DDLN-SWH-002
";
        let diags = graph
            .check_cross_references(&doc(text), &CrossReferenceRules::default())
            .unwrap_err();
        assert_eq!(diags.count(ErrorKind::SupersededCrossReference), 1);
        assert_eq!(diags.count(ErrorKind::UnresolvedCrossReference), 1);
        let msg = diags.to_string();
        assert!(msg.contains("deleted requirement REQ-0-DDLN-SWH-002 in certdocs/reqs.yaml:6"));
        assert!(msg.contains("inexistent requirement REQ-0-DDLN-SWL-009 in certdocs/reqs.yaml:5"));
    }

    #[test]
    fn test_parents_block_list_is_excused() {
        let mut graph = graph();
        let _ = graph.resolve();

        let text = "\
- id: REQ-0-DDLN-SWH-002
  text: DELETED Superseded
  attributes:
    Parents:
      - REQ-0-DDLN-SYS-001
- id: REQ-0-DDLN-SWL-001
  attributes:
    Parents:
      - REQ-0-DDLN-SWH-002
    Rationale: Replaces REQ-0-DDLN-SWH-002
";
        let diags = graph
            .check_cross_references(&doc(text), &CrossReferenceRules::default())
            .unwrap_err();
        // The block ends at the first line that is not a list item
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.to_string(),
            "Invalid reference to deleted requirement REQ-0-DDLN-SWH-002 in certdocs/reqs.yaml:10\n"
        );
    }

    #[test]
    fn test_clean_documents_pass() {
        let mut graph = graph();
        let _ = graph.resolve();
        let text = format!("- id: {}\n  text: Refines {}\n", LLR, HLR);
        assert!(graph
            .check_cross_references(&doc(&text), &CrossReferenceRules::default())
            .is_ok());
    }

    #[test]
    fn test_cross_references_wait_for_ingestion() {
        let graph = graph();
        let diags = graph
            .check_cross_references(&doc(""), &CrossReferenceRules::default())
            .unwrap_err();
        assert_eq!(diags.count(ErrorKind::Graph), 1);
    }
}

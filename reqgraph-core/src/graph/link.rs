use crate::error::{Diagnostics, GraphError, Referrer, TraceError};
use crate::models::{NodeId, RequirementLevel};

use super::{GraphPhase, ReqGraph};

impl ReqGraph {
    /// Links every node to its declared parents and computes status.
    ///
    /// Must be called once, after ingestion. All link defects are collected
    /// and returned together; if there are any, the graph is left unresolved
    /// and status propagation does not run.
    ///
    /// On success every parent sits at a strictly higher level than its
    /// children, which is what makes the traversals in `propagate_status`
    /// terminate.
    pub fn resolve(&mut self) -> Result<(), Diagnostics> {
        if self.phase != GraphPhase::Ingesting {
            return Err(GraphError::AlreadyLinked.into());
        }

        let mut diagnostics = Diagnostics::new();
        let ids: Vec<NodeId> = self.node_ids().collect();

        for &id in &ids {
            let node = self.node(id);
            if node.parent_ids.is_empty() && node.level != RequirementLevel::System {
                diagnostics.push(TraceError::MissingParent {
                    id: node.id.clone(),
                    path: node.path.clone(),
                });
            }

            let referrer = if node.is_code() {
                Referrer::CodeFile(node.path.clone())
            } else {
                Referrer::Requirement(node.id.clone())
            };

            for parent_key in node.parent_ids.clone() {
                let Some(parent_id) = self.lookup(&parent_key) else {
                    diagnostics.push(TraceError::UnresolvedParent {
                        referrer: referrer.clone(),
                        parent: parent_key,
                    });
                    continue;
                };

                let (node, parent) = (self.node(id), self.node(parent_id));
                if parent.level >= node.level {
                    diagnostics.push(TraceError::InvalidParentLevel {
                        referrer: referrer.clone(),
                        parent: parent_key,
                    });
                    continue;
                }
                if parent.is_deleted() && !node.is_deleted() {
                    diagnostics.push(TraceError::SupersededParentReference {
                        referrer: referrer.clone(),
                        parent: parent_key,
                    });
                    continue;
                }

                self.node_mut(parent_id).children.push(id);
                self.node_mut(id).parents.push(parent_id);
            }
        }

        if !diagnostics.is_empty() {
            log::info!("Linking failed with {} errors", diagnostics.len());
            self.phase = GraphPhase::LinkFailed;
            return Err(diagnostics);
        }

        self.sort_links(&ids);
        self.phase = GraphPhase::Linked;
        log::info!("Linked {} nodes", ids.len());

        self.propagate_status()?;
        Ok(())
    }

    /// Orders parent and child lists by position.
    ///
    /// Code files take the position of their first parent, so parents are
    /// sorted first and children last.
    fn sort_links(&mut self, ids: &[NodeId]) {
        for &id in ids {
            let mut parents = std::mem::take(&mut self.node_mut(id).parents);
            parents.sort_by_key(|p| self.node(*p).position);
            self.node_mut(id).parents = parents;
        }

        for &id in ids {
            let node = self.node(id);
            if node.is_code() {
                if let Some(&first) = node.parents.first() {
                    let position = self.node(first).position;
                    self.node_mut(id).position = position;
                }
            }
        }

        for &id in ids {
            let mut children = std::mem::take(&mut self.node_mut(id).children);
            children.sort_by_key(|c| self.node(*c).position);
            self.node_mut(id).children = children;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::graph::tests::{assert_acyclic, code, req, HLR, LLR, SYS};
    use crate::graph::{GraphPhase, ReqGraph};
    use crate::source::RawRequirement;

    fn ids<'a>(nodes: impl Iterator<Item = &'a crate::models::Node>) -> Vec<String> {
        nodes.map(|n| n.id.clone()).collect()
    }

    #[test]
    fn test_links_are_bidirectional() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![req(SYS, 0, &[]), req(HLR, 1, &[SYS]), req(LLR, 2, &[HLR])]);
        graph.add_code_file(code("src/main.c", &[LLR])).unwrap();
        graph.resolve().unwrap();

        for node in graph.nodes() {
            for parent in graph.parents_of(node) {
                assert!(ids(graph.children_of(parent)).contains(&node.id));
            }
            for child in graph.children_of(node) {
                assert!(ids(graph.parents_of(child)).contains(&node.id));
            }
        }
        assert_eq!(ids(graph.children_of(graph.get(LLR).unwrap())), vec!["src/main.c"]);
        assert_eq!(graph.phase(), GraphPhase::Linked);
        assert_acyclic(&graph);
    }

    #[test]
    fn test_missing_parent_once_per_node() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[]),
            req("REQ-0-DDLN-SWH-002", 2, &[]),
        ]);
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.count(ErrorKind::MissingParent), 2);
        assert_eq!(graph.phase(), GraphPhase::LinkFailed);
    }

    #[test]
    fn test_unresolved_parent_names_both_ids() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![req(SYS, 0, &[]), req(HLR, 1, &["REQ-X"])]);
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.len(), 1);

        let err = diags.iter().next().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnresolvedParent);
        let msg = err.to_string();
        assert!(msg.contains("REQ-X"));
        assert!(msg.contains(HLR));
        assert!(msg.starts_with("Invalid parent of requirement"));
    }

    #[test]
    fn test_unresolved_code_reference_names_file() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![req(SYS, 0, &[])]);
        graph.add_code_file(code("src/main.c", &[LLR])).unwrap();
        let diags = graph.resolve().unwrap_err();

        let msg = diags.to_string();
        assert_eq!(
            msg,
            format!("Invalid reference in file src/main.c: {} does not exist.\n", LLR)
        );
    }

    #[test]
    fn test_deleted_parent_is_reported_once() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[SYS]).with_body("DELETED old requirement"),
            req(LLR, 2, &[HLR]),
        ]);
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.count(ErrorKind::SupersededParentReference), 1);
        assert!(diags.to_string().contains("Invalid parent of requirement"));
    }

    #[test]
    fn test_deleted_code_reference_uses_file_message() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[SYS]),
            req(LLR, 2, &[HLR]).with_body("DELETED gone"),
        ]);
        graph.add_code_file(code("src/main.c", &[LLR])).unwrap();
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.count(ErrorKind::SupersededParentReference), 1);
        assert!(diags.to_string().starts_with("Invalid reference in file src/main.c"));
    }

    #[test]
    fn test_deleted_may_reference_deleted() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[SYS]).with_body("DELETED parent"),
            req(LLR, 2, &[HLR]).with_body("DELETED child"),
        ]);
        assert!(graph.resolve().is_ok());
    }

    #[test]
    fn test_parent_must_be_higher_level() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[SYS]),
            req("REQ-0-DDLN-SWH-002", 2, &[HLR]),
        ]);
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.count(ErrorKind::InvalidParentLevel), 1);
    }

    #[test]
    fn test_errors_are_accumulated_across_nodes() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &["REQ-0-DDLN-SYS-404"]),
            req(LLR, 2, &[]),
        ]);
        graph.add_code_file(code("src/a.c", &["REQ-0-DDLN-SWL-404"])).unwrap();
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(ErrorKind::UnresolvedParent), 2);
        assert_eq!(diags.count(ErrorKind::MissingParent), 1);
    }

    #[test]
    fn test_resolve_twice_is_rejected() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![req(SYS, 0, &[])]);
        graph.resolve().unwrap();
        let diags = graph.resolve().unwrap_err();
        assert_eq!(diags.count(ErrorKind::Graph), 1);
    }

    #[test]
    fn test_links_sorted_by_position() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req("REQ-0-DDLN-SYS-002", 5, &[]),
            req(SYS, 1, &[]),
            req("REQ-0-DDLN-SWH-003", 9, &[SYS]),
            req(HLR, 2, &["REQ-0-DDLN-SYS-002", SYS]),
            req("REQ-0-DDLN-SWH-002", 4, &[SYS]),
        ]);
        graph.resolve().unwrap();

        assert_eq!(
            ids(graph.parents_of(graph.get(HLR).unwrap())),
            vec![SYS.to_string(), "REQ-0-DDLN-SYS-002".to_string()]
        );
        assert_eq!(
            ids(graph.children_of(graph.get(SYS).unwrap())),
            vec![
                HLR.to_string(),
                "REQ-0-DDLN-SWH-002".to_string(),
                "REQ-0-DDLN-SWH-003".to_string()
            ]
        );
    }

    #[test]
    fn test_code_inherits_first_parent_position() {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[SYS]),
            req("REQ-0-DDLN-SWL-002", 7, &[HLR]),
            req(LLR, 3, &[HLR]),
        ]);
        graph
            .add_code_file(code("src/main.c", &["REQ-0-DDLN-SWL-002", LLR]))
            .unwrap();
        graph.resolve().unwrap();

        let file = graph.get("src/main.c").unwrap();
        assert_eq!(file.position, 3);
        assert_eq!(
            ids(graph.parents_of(file)),
            vec![LLR.to_string(), "REQ-0-DDLN-SWL-002".to_string()]
        );
    }

    #[test]
    fn test_record_constructor_derives_type() {
        assert_eq!(RawRequirement::new(LLR, "a.yaml", 0).req_type, "SWL");
    }
}

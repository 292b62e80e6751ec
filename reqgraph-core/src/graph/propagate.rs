use crate::error::GraphError;
use crate::models::{NodeId, RequirementLevel, RequirementStatus};

use super::ReqGraph;

impl ReqGraph {
    /// Computes completion status and reachability for every node.
    ///
    /// Runs the downward pass from each SYSTEM node, then the upward pass
    /// from each code file. Markers are cleared first, so running this again
    /// on the same graph gives the same result.
    pub fn propagate_status(&mut self) -> Result<(), GraphError> {
        if !self.is_linked() {
            return Err(GraphError::NotLinked);
        }

        let ids: Vec<NodeId> = self.node_ids().collect();
        for &id in &ids {
            let node = self.node_mut(id);
            node.reached = false;
            node.traced = false;
            node.status = RequirementStatus::NotStarted;
        }

        for &id in &ids {
            if self.node(id).level == RequirementLevel::System {
                self.resolve_down(id);
            }
        }
        for &id in &ids {
            if self.node(id).is_code() {
                self.resolve_up(id);
            }
        }

        log::debug!(
            "Propagated status; {} nodes unreached",
            self.nodes().filter(|n| !n.reached).count()
        );
        Ok(())
    }

    // Post-order over children. Shared descendants are evaluated once per
    // path; the result only depends on the child set, so that is harmless.
    fn resolve_down(&mut self, id: NodeId) -> RequirementStatus {
        let node = self.node_mut(id);
        node.reached = true;

        let status = if node.is_code() {
            RequirementStatus::Completed
        } else if node.children.is_empty() {
            RequirementStatus::NotStarted
        } else {
            let children = node.children.clone();
            let mut status = RequirementStatus::Completed;
            for child in children {
                if self.resolve_down(child) != RequirementStatus::Completed {
                    status = RequirementStatus::Started;
                }
            }
            status
        };

        self.node_mut(id).status = status;
        status
    }

    fn resolve_up(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.reached = true;
        node.traced = true;
        for parent in node.parents.clone() {
            self.resolve_up(parent);
        }
    }
}

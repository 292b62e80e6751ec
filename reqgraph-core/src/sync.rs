//! Task tracker synchronization
//!
//! Walks the resolved graph level by level from the SYSTEM requirements and
//! keeps one tracker task per requirement up to date. Tracker access goes
//! through the `TaskTracker` trait; this module performs no I/O of its own.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::GraphError;
use crate::graph::ReqGraph;
use crate::models::{Node, RequirementLevel};

/// Status a tracker reports for a task that was closed as invalid
pub const INVALID_STATUS: &str = "invalid";

/// A task as known to the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// Content written to a tracker task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// `<ID>: <title>`
    pub title: String,
    pub description: String,
    pub level: RequirementLevel,
    pub attributes: BTreeMap<String, String>,
    pub parent_tasks: Vec<String>,
}

impl TaskDraft {
    fn for_node(node: &Node, parent_tasks: Vec<String>) -> Self {
        Self {
            title: task_title(node),
            description: node.body_without_title().to_string(),
            level: node.level,
            attributes: node.attributes.clone(),
            parent_tasks,
        }
    }
}

/// Title of the task tracking a requirement
pub fn task_title(node: &Node) -> String {
    format!("{}: {}", node.id, node.title())
}

/// Operations needed from an issue tracker
pub trait TaskTracker {
    /// The meta-task every SYSTEM task hangs under, created if needed
    fn root_task(&mut self, title: &str) -> Result<String>;

    /// Finds the task tracking a requirement at the given level
    fn find_task(&mut self, req_id: &str, level: RequirementLevel) -> Result<Option<Task>>;

    /// Creates a task and returns its ID
    fn create_task(&mut self, req_id: &str, draft: &TaskDraft) -> Result<String>;

    fn update_task(&mut self, task_id: &str, draft: &TaskDraft) -> Result<()>;

    /// Closes the task of a deleted requirement as invalid
    fn invalidate_task(&mut self, task_id: &str, title: &str) -> Result<()>;
}

/// What a synchronization run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub invalidated: Vec<String>,
    /// Requirements outside the filter that were left alone
    pub skipped: usize,
}

/// Brings the tracker in line with the graph.
///
/// Only requirements in `filter` are written (all of them when `filter` is
/// `None`), but every requirement is visited so that children can find the
/// tasks of their parents. Levels are visited top down, each by position; a
/// linked graph only has parents at strictly higher levels, so a parent's
/// task is always known before any of its children are visited.
pub fn synchronize(
    graph: &ReqGraph,
    tracker: &mut dyn TaskTracker,
    project_name: &str,
    filter: Option<&HashSet<String>>,
) -> Result<SyncSummary> {
    if !graph.is_linked() {
        return Err(GraphError::NotLinked.into());
    }

    let root_title = format!("Implement {}", project_name);
    let root = tracker
        .root_task(&root_title)
        .context("Error creating parent of all tasks")?;

    let order = [
        RequirementLevel::System,
        RequirementLevel::High,
        RequirementLevel::Low,
    ]
    .into_iter()
    .flat_map(move |level| graph.nodes_by_level(level));
    let mut task_of: HashMap<&str, String> = HashMap::new();
    let mut summary = SyncSummary::default();

    for current in order {
        let task = tracker
            .find_task(&current.id, current.level)
            .with_context(|| format!("Error finding task for requirement {}", current.id))?;

        let parent_tasks = if current.level == RequirementLevel::System {
            vec![root.clone()]
        } else {
            let mut ids = Vec::new();
            for parent in graph.parents_of(current) {
                match task_of.get(parent.id.as_str()) {
                    Some(id) => ids.push(id.clone()),
                    None => anyhow::bail!(
                        "Error updating requirement {}. Parent {} has no corresponding task",
                        current.id,
                        parent.id
                    ),
                }
            }
            ids
        };

        let selected = filter.map_or(true, |ids| ids.contains(&current.id));
        if selected {
            let draft = TaskDraft::for_node(current, parent_tasks);
            match &task {
                None if !current.is_deleted() => {
                    log::info!("Creating task for requirement {}", current.id);
                    let id = tracker
                        .create_task(&current.id, &draft)
                        .with_context(|| format!("Error creating requirement {}", current.id))?;
                    task_of.insert(&current.id, id);
                    summary.created.push(current.id.clone());
                }
                None => {}
                Some(existing) if current.is_deleted() => {
                    if existing.status != INVALID_STATUS {
                        log::info!(
                            "Marking task {} for DELETED requirement {} as invalid",
                            existing.id,
                            current.id
                        );
                        tracker
                            .invalidate_task(&existing.id, &draft.title)
                            .with_context(|| format!("Error updating requirement {}", current.id))?;
                        summary.invalidated.push(current.id.clone());
                    }
                }
                Some(existing) => {
                    log::info!("Updating task {} for requirement {}", existing.id, current.id);
                    tracker
                        .update_task(&existing.id, &draft)
                        .with_context(|| format!("Error updating requirement {}", current.id))?;
                    summary.updated.push(current.id.clone());
                }
            }
        } else {
            summary.skipped += 1;
        }

        if let Some(existing) = task {
            task_of.insert(&current.id, existing.id);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{code, req, HLR, LLR, SYS};

    /// Records every call and hands out sequential task IDs
    #[derive(Default)]
    struct MockTracker {
        tasks: HashMap<String, Task>,
        calls: Vec<String>,
        drafts: HashMap<String, TaskDraft>,
        next: usize,
    }

    impl MockTracker {
        fn with_task(mut self, req_id: &str, status: &str) -> Self {
            self.next += 1;
            self.tasks.insert(
                req_id.to_string(),
                Task {
                    id: format!("T{}", self.next),
                    title: req_id.to_string(),
                    status: status.to_string(),
                },
            );
            self
        }
    }

    impl TaskTracker for MockTracker {
        fn root_task(&mut self, title: &str) -> Result<String> {
            self.calls.push(format!("root {}", title));
            Ok("T0".to_string())
        }

        fn find_task(&mut self, req_id: &str, _level: RequirementLevel) -> Result<Option<Task>> {
            Ok(self.tasks.get(req_id).cloned())
        }

        fn create_task(&mut self, req_id: &str, draft: &TaskDraft) -> Result<String> {
            self.next += 1;
            let id = format!("T{}", self.next);
            self.calls.push(format!("create {}", req_id));
            self.drafts.insert(req_id.to_string(), draft.clone());
            Ok(id)
        }

        fn update_task(&mut self, task_id: &str, draft: &TaskDraft) -> Result<()> {
            self.calls.push(format!("update {}", task_id));
            self.drafts.insert(task_id.to_string(), draft.clone());
            Ok(())
        }

        fn invalidate_task(&mut self, task_id: &str, _title: &str) -> Result<()> {
            self.calls.push(format!("invalidate {}", task_id));
            Ok(())
        }
    }

    fn graph() -> ReqGraph {
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(HLR, 1, &[SYS]),
            req("REQ-0-DDLN-SWH-002", 2, &[SYS]).with_body("DELETED Old"),
            req(LLR, 3, &[HLR]),
        ]);
        graph.add_code_file(code("src/main.c", &[LLR])).unwrap();
        graph.resolve().unwrap();
        graph
    }

    #[test]
    fn test_creates_tasks_top_down() {
        let graph = graph();
        let mut tracker = MockTracker::default();
        let summary = synchronize(&graph, &mut tracker, "DDLN", None).unwrap();

        assert_eq!(
            tracker.calls,
            vec![
                "root Implement DDLN".to_string(),
                format!("create {}", SYS),
                format!("create {}", HLR),
                format!("create {}", LLR),
            ]
        );
        assert_eq!(summary.created.len(), 3);
        assert!(summary.updated.is_empty());

        assert_eq!(tracker.drafts[SYS].parent_tasks, vec!["T0".to_string()]);
        assert_eq!(tracker.drafts[HLR].parent_tasks, vec!["T1".to_string()]);
        assert_eq!(tracker.drafts[LLR].parent_tasks, vec!["T2".to_string()]);
        assert_eq!(tracker.drafts[LLR].title, format!("{}: Title of {}", LLR, LLR));
        assert_eq!(tracker.drafts[LLR].description, format!("Body of {}", LLR));
    }

    #[test]
    fn test_updates_and_invalidates_existing_tasks() {
        let graph = graph();
        let mut tracker = MockTracker::default()
            .with_task(SYS, "open")
            .with_task("REQ-0-DDLN-SWH-002", "open");
        let summary = synchronize(&graph, &mut tracker, "DDLN", None).unwrap();

        assert_eq!(summary.updated, vec![SYS.to_string()]);
        assert_eq!(summary.invalidated, vec!["REQ-0-DDLN-SWH-002".to_string()]);
        assert!(tracker.calls.contains(&"invalidate T2".to_string()));
    }

    #[test]
    fn test_already_invalid_task_is_left_alone() {
        let graph = graph();
        let mut tracker = MockTracker::default().with_task("REQ-0-DDLN-SWH-002", INVALID_STATUS);
        let summary = synchronize(&graph, &mut tracker, "DDLN", None).unwrap();
        assert!(summary.invalidated.is_empty());
    }

    #[test]
    fn test_filter_limits_writes() {
        let graph = graph();
        let mut tracker = MockTracker::default().with_task(SYS, "open").with_task(HLR, "open");
        let filter: HashSet<String> = [LLR.to_string()].into_iter().collect();
        let summary = synchronize(&graph, &mut tracker, "DDLN", Some(&filter)).unwrap();

        assert_eq!(summary.created, vec![LLR.to_string()]);
        assert_eq!(summary.skipped, 3);
        assert_eq!(tracker.drafts[LLR].parent_tasks, vec!["T2".to_string()]);
    }

    #[test]
    fn test_parent_without_task_is_an_error() {
        let graph = graph();
        let mut tracker = MockTracker::default();
        let filter: HashSet<String> = [LLR.to_string()].into_iter().collect();
        let err = synchronize(&graph, &mut tracker, "DDLN", Some(&filter)).unwrap_err();
        assert!(err.to_string().contains("has no corresponding task"));
    }

    #[test]
    fn test_parents_across_skipped_levels() {
        // The LOW requirement sorts before its HIGH parent and also hangs
        // directly under SYSTEM
        let mut graph = ReqGraph::new();
        graph.ingest(vec![
            req(SYS, 0, &[]),
            req(LLR, 1, &[SYS, HLR]),
            req(HLR, 2, &[SYS]),
        ]);
        graph.resolve().unwrap();

        let mut tracker = MockTracker::default();
        let summary = synchronize(&graph, &mut tracker, "DDLN", None).unwrap();

        assert_eq!(
            summary.created,
            vec![SYS.to_string(), HLR.to_string(), LLR.to_string()]
        );
        assert_eq!(
            tracker.drafts[LLR].parent_tasks,
            vec!["T1".to_string(), "T2".to_string()]
        );
    }

    #[test]
    fn test_requires_linked_graph() {
        let graph = ReqGraph::new();
        let mut tracker = MockTracker::default();
        assert!(synchronize(&graph, &mut tracker, "DDLN", None).is_err());
        assert!(tracker.calls.is_empty());
    }
}

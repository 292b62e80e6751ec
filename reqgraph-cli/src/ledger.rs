//! YAML task ledger
//!
//! A file-backed `TaskTracker`: one task per requirement, plus the root task
//! every SYSTEM task hangs under.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use reqgraph_core::sync::INVALID_STATUS;
use reqgraph_core::{RequirementLevel, Task, TaskDraft, TaskTracker};

const OPEN_STATUS: &str = "open";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerTask {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub status: String,
    pub level: RequirementLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl LedgerTask {
    fn apply(&mut self, draft: &TaskDraft) {
        self.title = draft.title.clone();
        self.description = draft.description.clone();
        self.level = draft.level;
        self.parents = draft.parent_tasks.clone();
        self.attributes = draft.attributes.clone();
    }

    fn as_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootTask {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct LedgerData {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    root: Option<RootTask>,
    /// Tasks keyed by requirement ID
    #[serde(default)]
    tasks: BTreeMap<String, LedgerTask>,
}

pub struct TaskLedger {
    path: PathBuf,
    data: LedgerData,
}

impl TaskLedger {
    /// Opens a ledger, starting empty if the file does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read task ledger: {:?}", path))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse task ledger: {:?}", path))?
        } else {
            LedgerData::default()
        };
        Ok(Self { path, data })
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml::to_string(&self.data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write task ledger to {:?}", self.path))
    }

    pub fn task(&self, req_id: &str) -> Option<&LedgerTask> {
        self.data.tasks.get(req_id)
    }

    pub fn root(&self) -> Option<&RootTask> {
        self.data.root.as_ref()
    }

    fn next_task_id(&mut self) -> String {
        self.data.next_id += 1;
        format!("T{}", self.data.next_id)
    }

    fn task_by_id_mut(&mut self, task_id: &str) -> Result<&mut LedgerTask> {
        self.data
            .tasks
            .values_mut()
            .find(|t| t.id == task_id)
            .with_context(|| format!("Task not found: {}", task_id))
    }
}

impl TaskTracker for TaskLedger {
    fn root_task(&mut self, title: &str) -> Result<String> {
        if let Some(root) = &self.data.root {
            return Ok(root.id.clone());
        }
        let id = self.next_task_id();
        self.data.root = Some(RootTask {
            id: id.clone(),
            title: title.to_string(),
        });
        Ok(id)
    }

    fn find_task(&mut self, req_id: &str, level: RequirementLevel) -> Result<Option<Task>> {
        Ok(self
            .data
            .tasks
            .get(req_id)
            .filter(|t| t.level == level)
            .map(LedgerTask::as_task))
    }

    fn create_task(&mut self, req_id: &str, draft: &TaskDraft) -> Result<String> {
        if self.data.tasks.contains_key(req_id) {
            anyhow::bail!("Requirement {} already has a task", req_id);
        }
        let id = self.next_task_id();
        let mut task = LedgerTask {
            id: id.clone(),
            title: String::new(),
            description: String::new(),
            status: OPEN_STATUS.to_string(),
            level: draft.level,
            parents: Vec::new(),
            attributes: BTreeMap::new(),
        };
        task.apply(draft);
        self.data.tasks.insert(req_id.to_string(), task);
        Ok(id)
    }

    fn update_task(&mut self, task_id: &str, draft: &TaskDraft) -> Result<()> {
        self.task_by_id_mut(task_id)?.apply(draft);
        Ok(())
    }

    fn invalidate_task(&mut self, task_id: &str, title: &str) -> Result<()> {
        let task = self.task_by_id_mut(task_id)?;
        task.title = title.to_string();
        task.status = INVALID_STATUS.to_string();
        Ok(())
    }
}

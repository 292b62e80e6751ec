pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod query;
pub mod source;
pub mod sync;
pub mod validate;

// Re-export commonly used types
pub use config::{
    determine_config_path, get_user_config_path, load_project_config, AttributeRule,
    ProjectConfig,
};
pub use error::{Diagnostics, ErrorKind, GraphError, Referrer, TraceError};
pub use graph::{GraphPhase, ReqGraph};
pub use models::{
    is_requirement_id, requirement_type, Node, RequirementLevel, RequirementStatus,
    BODY_ATTRIBUTE, DELETED_PREFIX, PARENTS_ATTRIBUTE, REQ_ID_PATTERN,
};
pub use query::ReqFilter;
pub use source::{CodeReferences, DocumentSource, RawRequirement, SourceDocument};
pub use sync::{synchronize, task_title, SyncSummary, Task, TaskDraft, TaskTracker};
pub use validate::{AttributeSchema, CrossReferenceRules};

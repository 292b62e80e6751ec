use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "REQGRAPH_CONFIG";

/// Config file looked up in the repository root
pub const LOCAL_CONFIG_FILE: &str = "reqgraph.yaml";

/// One attribute every requirement must declare
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeRule {
    /// Attribute name as written in the documents
    pub name: String,
    /// Regular expression the value must match, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl AttributeRule {
    pub fn new(name: &str, value: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            value: value.map(str::to_string),
        }
    }
}

/// Per-repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project tag used for task tracking
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Directory holding certification documents, relative to the repository root
    #[serde(default = "default_certdoc_path")]
    pub certdoc_path: PathBuf,

    /// Directory holding source code, relative to the repository root
    #[serde(default = "default_code_path")]
    pub code_path: PathBuf,

    /// File extensions scanned for `@llr` directives
    #[serde(default = "default_code_extensions")]
    pub code_extensions: Vec<String>,

    /// Attributes every requirement must declare, checked in order
    #[serde(default = "default_attributes")]
    pub attributes: Vec<AttributeRule>,

    /// Task ledger used by `sync`, relative to the repository root
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

fn default_project_name() -> String {
    String::from("Reqgraph")
}

fn default_certdoc_path() -> PathBuf {
    PathBuf::from("certdocs")
}

fn default_code_path() -> PathBuf {
    PathBuf::from("src")
}

fn default_code_extensions() -> Vec<String> {
    ["c", "cc", "h", "hh", "go", "rs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_attributes() -> Vec<AttributeRule> {
    vec![
        AttributeRule::new("Rationale", None),
        AttributeRule::new("Parents", Some(r"^REQ-\d+-\w+-(SYS|SWH|HWH|SWL|HWL)-\d+")),
        AttributeRule::new(
            "Verification",
            Some("^(Test|Inspection|Analysis|Demonstration)$"),
        ),
        AttributeRule::new("Safety impact", None),
    ]
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(".reqgraph-tasks.yaml")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            certdoc_path: default_certdoc_path(),
            code_path: default_code_path(),
            code_extensions: default_code_extensions(),
            attributes: default_attributes(),
            ledger_path: default_ledger_path(),
        }
    }
}

impl ProjectConfig {
    /// Loads a config file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))
    }

    /// Save the config to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Whether a file extension is one of the scanned code extensions
    pub fn is_code_extension(&self, ext: &str) -> bool {
        self.code_extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}

/// Gets the user-level config file path
pub fn get_user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reqgraph").join("config.yaml"))
}

/// Determines which config file applies, if any.
///
/// Priority: explicit path, `REQGRAPH_CONFIG`, `reqgraph.yaml` in the
/// repository root, then the user config directory.
pub fn determine_config_path(explicit: Option<&Path>, repo_root: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(env_path) = env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if !path.exists() {
            anyhow::bail!("Config file from {} not found: {:?}", CONFIG_ENV, path);
        }
        return Ok(Some(path));
    }

    let local = repo_root.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(get_user_config_path().filter(|p| p.exists()))
}

/// Loads the applicable config, falling back to defaults
pub fn load_project_config(explicit: Option<&Path>, repo_root: &Path) -> Result<ProjectConfig> {
    match determine_config_path(explicit, repo_root)? {
        Some(path) => {
            log::debug!("Using config {}", path.display());
            ProjectConfig::load(path)
        }
        None => Ok(ProjectConfig::default()),
    }
}

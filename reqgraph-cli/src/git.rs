use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

static DIFF_REVISION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Differential Revision:\s+(\S+)").expect("valid revision pattern")
});

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Top-level directory of the git repository containing `dir`
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    let out = run_git(dir, &["rev-parse", "--show-toplevel"])
        .context("Not inside a git repository; use --repo")?;
    Ok(PathBuf::from(out.trim()))
}

/// Review URLs quoted in commit messages, oldest last as git prints them
pub fn parse_revision_urls(log: &str) -> Vec<String> {
    DIFF_REVISION
        .captures_iter(log)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Review changelists that touched any of `paths`, keyed by revision name
pub fn changelists(root: &Path, paths: &[String]) -> Result<BTreeMap<String, String>> {
    let mut lists = BTreeMap::new();
    for path in paths {
        let log = run_git(root, &["log", "--", path])?;
        let urls = parse_revision_urls(&log);
        if urls.is_empty() {
            log::warn!("No changelist found for {}", path);
        }
        for url in urls {
            let name = url.rsplit('/').next().unwrap_or(&url).to_string();
            lists.insert(name, url);
        }
    }
    Ok(lists)
}

//! Source tree scanner for `@llr` directives

use regex::Regex;
use sha1::{Digest, Sha1};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use reqgraph_core::{CodeReferences, ProjectConfig, TraceError};

/// `// @llr REQ-...-SWL-...` marks the low-level requirement a file implements
static LLR_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//\s*@llr\s*(REQ-\d+-\w+-SWL-\d+)").expect("valid directive pattern")
});

/// Hash git assigns to a blob with these contents
pub fn git_blob_hash(contents: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", contents.len()).as_bytes());
    hasher.update(contents);
    hex::encode(hasher.finalize())
}

/// Collects the directives of one file, in order of appearance
pub fn parse_code(path: &str, contents: &[u8]) -> CodeReferences {
    let text = String::from_utf8_lossy(contents);
    let requirement_ids = text
        .lines()
        .filter_map(|line| LLR_DIRECTIVE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect();

    CodeReferences {
        path: path.to_string(),
        hash: git_blob_hash(contents),
        requirement_ids,
    }
}

pub struct CodeScanner<'a> {
    root: PathBuf,
    config: &'a ProjectConfig,
}

impl<'a> CodeScanner<'a> {
    pub fn new<P: AsRef<Path>>(root: P, config: &'a ProjectConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    fn relative(&self, path: &Path) -> Result<String, TraceError> {
        path.strip_prefix(&self.root)
            .map(|rel| rel.to_string_lossy().into_owned())
            .map_err(|_| TraceError::MalformedSourcePath {
                path: path.display().to_string(),
                root: self.root.display().to_string(),
            })
    }

    /// Scans every code file below the configured code path.
    ///
    /// Files without directives are returned too; the graph skips them.
    pub fn scan(&self) -> (Vec<CodeReferences>, Vec<TraceError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        let dir = self.root.join(&self.config.code_path);

        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_code = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| self.config.is_code_extension(e))
                .unwrap_or(false);
            if !is_code {
                continue;
            }

            let rel = match self.relative(path) {
                Ok(rel) => rel,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            match fs::read(path) {
                Ok(contents) => files.push(parse_code(&rel, &contents)),
                Err(e) => errors.push(TraceError::Source(format!("{}: {}", rel, e))),
            }
        }

        log::info!(
            "Scanned {} code files under {}",
            files.len(),
            self.config.code_path.display()
        );
        (files, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqgraph_core::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_git_blob_hash() {
        assert_eq!(git_blob_hash(b""), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(git_blob_hash(b"hello\n"), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn test_parse_code_directives() {
        let source = b"\
// @llr REQ-0-DDLN-SWL-001
//@llr REQ-0-DDLN-SWL-002
// @llr REQ-0-DDLN-SWH-003
int main() { return 0; } // @llr REQ-0-DDLN-SWL-004
";
        let refs = parse_code("src/main.c", source);
        assert_eq!(refs.path, "src/main.c");
        assert_eq!(
            refs.requirement_ids,
            vec!["REQ-0-DDLN-SWL-001", "REQ-0-DDLN-SWL-002", "REQ-0-DDLN-SWL-004"]
        );
        assert_eq!(refs.hash, git_blob_hash(source));
    }

    #[test]
    fn test_scan_respects_extensions() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let src = dir.path().join("src").join("net");
        fs::create_dir_all(&src)?;
        fs::write(src.join("socket.c"), "// @llr REQ-0-DDLN-SWL-001\n")?;
        fs::write(src.join("socket.h"), "struct socket;\n")?;
        fs::write(src.join("README.md"), "// @llr REQ-0-DDLN-SWL-009\n")?;

        let config = ProjectConfig::default();
        let (files, errors) = CodeScanner::new(dir.path(), &config).scan();
        assert!(errors.is_empty());
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/net/socket.c");
        assert_eq!(files[0].requirement_ids, vec!["REQ-0-DDLN-SWL-001"]);
        assert!(files[1].requirement_ids.is_empty());
        Ok(())
    }

    #[test]
    fn test_code_outside_root_is_malformed() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let elsewhere = TempDir::new()?;
        fs::write(elsewhere.path().join("main.c"), "// @llr REQ-0-DDLN-SWL-001\n")?;

        let mut config = ProjectConfig::default();
        config.code_path = elsewhere.path().to_path_buf();
        let (files, errors) = CodeScanner::new(root.path(), &config).scan();

        assert!(files.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::MalformedSourcePath);
        Ok(())
    }
}

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

const MAX_READ_BYTES: u64 = 512 * 1024;
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__", ".venv", "venv"];

/// Sandboxed read-only access to one workspace directory.
#[derive(Debug, Clone)]
pub struct WorkspaceTools {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl WorkspaceTools {
    pub fn new(root: PathBuf) -> Self {
        let canonical_root = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
        Self {
            root,
            canonical_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            bail!("path must not be empty");
        }
        if path.starts_with('/') || path.contains('\\') {
            bail!("absolute or platform-specific path not allowed: {path}");
        }
        if Path::new(path)
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            bail!("path traversal not allowed: {path}");
        }

        let joined = self.root.join(path);
        let canonical = fs::canonicalize(&joined)
            .with_context(|| format!("no such file or directory: {path}"))?;
        if !canonical.starts_with(&self.canonical_root) {
            bail!("path escapes the workspace: {path}");
        }
        Ok(canonical)
    }

    fn resolve_dir(&self, path: Option<&str>) -> Result<PathBuf> {
        match path.map(str::trim) {
            None | Some("") | Some(".") => Ok(self.canonical_root.clone()),
            Some(path) => self.resolve(path),
        }
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.canonical_root)
            .map(|relative| relative.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string_lossy().into_owned())
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        let resolved = self.resolve(path)?;
        let metadata = fs::metadata(&resolved)
            .with_context(|| format!("failed to inspect {path}"))?;
        if !metadata.is_file() {
            bail!("{path} is not a file");
        }
        if metadata.len() > MAX_READ_BYTES {
            bail!(
                "{path} is {} bytes; read_file is limited to {MAX_READ_BYTES} bytes",
                metadata.len()
            );
        }
        fs::read_to_string(&resolved).with_context(|| format!("failed to read {path}"))
    }

    pub fn list_files(&self, path: Option<&str>, max_entries: usize) -> Result<String> {
        let dir = self.resolve_dir(path)?;
        let limit = max_entries.clamp(1, 2000);

        if dir.is_file() {
            return Ok(self.display(&dir));
        }

        let mut children = sorted_children(&dir)?;
        children.retain(|child| !is_hidden_or_skipped(child));

        let entries: Vec<String> = children
            .iter()
            .take(limit)
            .map(|child| {
                let mut shown = self.display(child);
                if child.is_dir() {
                    shown.push('/');
                }
                shown
            })
            .collect();

        if entries.is_empty() {
            Ok("(no files found)".to_string())
        } else {
            Ok(entries.join("\n"))
        }
    }

    /// Line search; case-insensitive unless the query has an uppercase letter.
    pub fn search_files(&self, query: &str, path: Option<&str>, max_results: usize) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            bail!("search_files requires a non-empty 'query' field");
        }
        let root = self.resolve_dir(path)?;
        let limit = max_results.clamp(1, 200);
        let case_sensitive = query.chars().any(char::is_uppercase);
        let needle = if case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };

        let mut hits = Vec::new();
        let mut pending = vec![root];
        while let Some(path) = pending.pop() {
            if path.is_dir() {
                let mut children = sorted_children(&path)?;
                children.retain(|child| !is_hidden_or_skipped(child));
                pending.extend(children.into_iter().rev());
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for (line_no, line) in content.lines().enumerate() {
                let haystack = if case_sensitive {
                    line.to_string()
                } else {
                    line.to_lowercase()
                };
                if haystack.contains(&needle) {
                    hits.push(format!("{}:{}:{}", self.display(&path), line_no + 1, line));
                    if hits.len() >= limit {
                        return Ok(hits.join("\n"));
                    }
                }
            }
        }

        if hits.is_empty() {
            Ok("No matches found.".to_string())
        } else {
            Ok(hits.join("\n"))
        }
    }
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("failed to list entries in {}", dir.display()))?;
    children.sort();
    Ok(children)
}

fn is_hidden_or_skipped(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };
    name.starts_with('.') || (path.is_dir() && SKIPPED_DIRS.iter().any(|skipped| name == *skipped))
}

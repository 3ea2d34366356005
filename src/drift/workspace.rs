//! File access for a drift run.
//!
//! Paths handed out by a [`Workspace`] are relative to its root and use `/`
//! separators, so rule globs match the same way on every platform.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use walkdir::WalkDir;

use crate::matcher::globs::normalize_separators;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "target", "__pycache__"];

/// Source of files for a run.
pub trait Workspace: Sync {
    /// Every file in the workspace, sorted.
    fn list_files(&self) -> anyhow::Result<Vec<String>>;

    /// Raw content of one file.
    fn read_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

/// A directory on disk.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

impl Workspace for FsWorkspace {
    fn list_files(&self) -> anyhow::Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            files.push(normalize_separators(&relative.to_string_lossy()));
        }
        files.sort();
        Ok(files)
    }

    fn read_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let full = self.root.join(path);
        std::fs::read(&full).with_context(|| format!("reading {}", full.display()))
    }
}

/// An in-memory file set.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkspace {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }
}

impl Workspace for MemoryWorkspace {
    fn list_files(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such file: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_workspace_skips_hidden_and_vendor() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for dir in ["src/api", ".git", "node_modules/pkg", "vendor", "target/debug"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::write(root.join("src/api/users.ts"), "export {}").unwrap();
        std::fs::write(root.join("README.md"), "# hi").unwrap();
        std::fs::write(root.join(".git/config"), "x").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(root.join("vendor/lib.go"), "x").unwrap();
        std::fs::write(root.join("target/debug/out.rs"), "x").unwrap();

        let ws = FsWorkspace::new(root);
        assert_eq!(ws.list_files().unwrap(), vec!["README.md", "src/api/users.ts"]);
        assert_eq!(ws.read_bytes("README.md").unwrap(), b"# hi");
        assert!(ws.read_bytes("missing.md").is_err());
    }

    #[test]
    fn test_memory_workspace() {
        let ws = MemoryWorkspace::new()
            .with_file("b.py", "def b(): pass")
            .with_file("a.py", "def a(): pass");
        assert_eq!(ws.list_files().unwrap(), vec!["a.py", "b.py"]);
        assert_eq!(ws.read_bytes("a.py").unwrap(), b"def a(): pass");
    }
}

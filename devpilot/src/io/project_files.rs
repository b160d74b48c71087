//! Generated project files under `<root>/<projects_dir>/<slug>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::core::code_blocks::render_code_blocks;
use crate::core::project::{ProjectId, project_relative_path};
use crate::core::types::CodeFile;

#[derive(Debug, Clone)]
pub struct ProjectFiles {
    root: PathBuf,
}

impl ProjectFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.slug())
    }

    /// Overwrite `file_path` (relative to the project directory), creating parents.
    ///
    /// Absolute paths and `..` components are refused.
    pub fn write(&self, project: &ProjectId, file_path: &str, content: &str) -> Result<PathBuf> {
        let relative = project_relative_path(file_path)?;
        let path = self.project_dir(project).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), bytes = content.len(), "wrote project file");
        Ok(path)
    }

    /// Write every record in order. Stops at the first failure; earlier files stay written.
    #[instrument(skip_all, fields(project = %project, files = files.len()))]
    pub fn write_all(&self, project: &ProjectId, files: &[CodeFile]) -> Result<Vec<PathBuf>> {
        let written = files
            .iter()
            .map(|file| self.write(project, &file.file, &file.code))
            .collect::<Result<Vec<_>>>()?;
        info!(count = written.len(), "saved generated code");
        Ok(written)
    }

    /// Every readable text file in the project, sorted by path. Hidden entries are skipped.
    pub fn read_files(&self, project: &ProjectId) -> Result<Vec<CodeFile>> {
        let dir = self.project_dir(project);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        let walker = WalkDir::new(&dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
        for entry in walker {
            let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(code) = fs::read_to_string(entry.path()) else {
                debug!(path = %entry.path().display(), "skipping non-text file");
                continue;
            };
            let relative = entry
                .path()
                .strip_prefix(&dir)
                .with_context(|| format!("relativize {}", entry.path().display()))?;
            files.push(CodeFile {
                file: relative.to_string_lossy().replace('\\', "/"),
                code,
            });
        }
        Ok(files)
    }

    /// Project code in the `~~~` / `File:` grammar, bounded by `limit_bytes`.
    ///
    /// Files that would push the document past the limit are left out.
    pub fn code_markdown(&self, project: &ProjectId, limit_bytes: usize) -> Result<String> {
        let mut kept = Vec::new();
        let mut used = 0usize;
        let mut skipped = 0usize;
        for file in self.read_files(project)? {
            let cost = file.file.len() + file.code.len();
            if used + cost > limit_bytes {
                skipped += 1;
                continue;
            }
            used += cost;
            kept.push(file);
        }
        if skipped > 0 {
            debug!(project = %project, skipped, limit_bytes, "code context truncated");
        }
        if kept.is_empty() {
            return Ok(String::new());
        }
        Ok(render_code_blocks(&kept))
    }

    /// Slugs of every project directory, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut slugs = Vec::new();
        for entry in
            fs::read_dir(&self.root).with_context(|| format!("read {}", self.root.display()))?
        {
            let entry = entry.with_context(|| format!("read {}", self.root.display()))?;
            let name = entry.file_name();
            if entry.path().is_dir() && !is_hidden(&name) {
                slugs.push(name.to_string_lossy().into_owned());
            }
        }
        slugs.sort();
        Ok(slugs)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

//! Project identity: human-readable name plus filesystem-safe slug.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::response::Rejection;

/// Identifies a project. All stores key on [`ProjectId::slug`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId {
    name: String,
    slug: String,
}

impl ProjectId {
    /// Normalize `name` into a project id.
    ///
    /// Errors when the name has no characters that survive normalization.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(anyhow!("invalid project name {name:?}: empty after normalization"));
        }
        Ok(Self {
            name: name.to_string(),
            slug,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug)
    }
}

/// Lowercase, whitespace to hyphens, keep `[a-z0-9_-]`, collapse hyphen runs.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars().flat_map(char::to_lowercase) {
        let mapped = if ch.is_whitespace() { '-' } else { ch };
        let keep = mapped.is_ascii_alphanumeric() || mapped == '_' || mapped == '-';
        if !keep {
            continue;
        }
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }
    slug.trim_matches('-').to_string()
}

/// Normalize a model-supplied file path so it stays inside a project directory.
///
/// `.` components are dropped. Absolute paths, `..` components and empty
/// paths are rejected.
pub fn project_relative_path(file_path: &str) -> Result<PathBuf, Rejection> {
    let mut clean = PathBuf::new();
    for component in Path::new(file_path.trim()).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Rejection::new(format!(
                    "refusing path with '..' component: {file_path:?}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Rejection::new(format!("refusing absolute path: {file_path:?}")));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(Rejection::new("empty file path"));
    }
    Ok(clean)
}

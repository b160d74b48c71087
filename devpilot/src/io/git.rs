//! Git adapter used by decision mode.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Clones repositories into project directories.
pub trait RepositoryCloner: Send + Sync {
    /// Clone `url` into `dest`, returning the checkout path.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<PathBuf>;
}

/// Wrapper around the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct Git;

impl Git {
    fn run_checked(&self, args: &[&str], workdir: &Path) -> Result<Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }
}

impl RepositoryCloner for Git {
    /// Clones into `dest/<repo name>`. Refuses to clone over an existing checkout.
    #[instrument(skip_all, fields(url))]
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        let name = repo_name(url)?;
        fs::create_dir_all(dest).with_context(|| format!("create directory {}", dest.display()))?;
        let target = dest.join(&name);
        if target.exists() {
            return Err(anyhow!("clone target {} already exists", target.display()));
        }
        debug!(target = %target.display(), "cloning repository");
        self.run_checked(&["clone", "--depth", "1", "--", url, &name], dest)?;
        Ok(target)
    }
}

/// Directory name git would pick for `url`.
pub fn repo_name(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");
    if last.is_empty() || last == "." || last == ".." {
        return Err(anyhow!("cannot derive repository name from {url:?}"));
    }
    Ok(last.to_string())
}

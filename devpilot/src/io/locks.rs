use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::core::project::ProjectId;

/// One mutex per project slug, created on first use.
///
/// Writers to different projects never contend; writers to the same project
/// are serialized for the whole read-modify-write cycle.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project: &ProjectId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow!("project lock table poisoned"))?;
        Ok(locks
            .entry(project.slug().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }
}

/// Lock `lock`, mapping poisoning to an error naming `project`.
pub fn acquire<'a>(lock: &'a Mutex<()>, project: &ProjectId) -> Result<MutexGuard<'a, ()>> {
    lock.lock()
        .map_err(|_| anyhow!("lock for project {project} poisoned"))
}

//! Playbook existence checks.

use crate::variables::has_variables;
use crate::{ConfigError, ConfigResult};
use jobdef_core::{JobDefinition, JobDescriptor, PlaybookPath};
use std::path::{Path, PathBuf};

/// Locate a playbook under a project root.
pub fn locate(root: &Path, playbook: &PlaybookPath) -> ConfigResult<PathBuf> {
    let path = root.join(playbook.as_path());
    if path.is_file() {
        Ok(path)
    } else {
        Err(ConfigError::PlaybookNotFound(path))
    }
}

/// Check that every literal playbook a job names exists under `root`.
///
/// Paths with `${...}` references are skipped; they are checked on the
/// resolved descriptor instead.
pub fn check_job(root: &Path, job: &JobDefinition) -> ConfigResult<()> {
    for playbook in std::iter::once(&job.run).chain(job.post_run.as_ref()) {
        if !has_variables(playbook.as_str()) {
            locate(root, playbook)?;
        }
    }
    Ok(())
}

/// Check that every playbook of a resolved job exists under `root`.
pub fn check_descriptor(root: &Path, descriptor: &JobDescriptor) -> ConfigResult<()> {
    for playbook in descriptor.playbooks() {
        locate(root, playbook)?;
    }
    Ok(())
}

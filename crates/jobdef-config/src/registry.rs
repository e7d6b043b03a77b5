//! The registry of known jobs.

use crate::{ConfigError, ConfigResult};
use jobdef_core::JobDefinition;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Anything that can answer whether a job name may be used as a parent.
pub trait KnownJobs {
    fn is_known(&self, name: &str) -> bool;
}

/// A link in an inheritance chain.
#[derive(Debug, Clone, Copy)]
pub enum Ancestor<'a> {
    /// A job loaded into the registry.
    Defined(&'a JobDefinition),
    /// A job defined elsewhere, known only by name.
    External(&'a str),
}

impl<'a> Ancestor<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            Ancestor::Defined(job) => job.name.as_str(),
            Ancestor::External(name) => name,
        }
    }
}

/// Jobs available for parent resolution.
///
/// Holds the definitions loaded so far plus the names of external jobs that
/// are defined in other repositories and may only be referenced.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, JobDefinition>,
    external: BTreeSet<String>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that knows the given external job names.
    pub fn with_external<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.declare_external(name);
        }
        registry
    }

    /// Declare a job defined outside the loaded documents.
    pub fn declare_external(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.jobs.contains_key(&name) {
            self.external.insert(name);
        }
    }

    /// Add a loaded job.
    ///
    /// A loaded job replaces an external declaration of the same name.
    pub fn insert(&mut self, job: JobDefinition) -> ConfigResult<()> {
        if self.jobs.contains_key(&job.name) {
            return Err(ConfigError::Duplicate(format!("job '{}'", job.name)));
        }
        if self.external.remove(&job.name) {
            debug!(job = %job.name, "definition replaces external declaration");
        }
        self.jobs.insert(job.name.clone(), job);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name) || self.external.contains(name)
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.external.contains(name)
    }

    /// Names of loaded jobs, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Loaded jobs, sorted by name.
    pub fn jobs(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// The inheritance chain of a loaded job: the job first, its root last.
    pub fn ancestors(&self, name: &str) -> ConfigResult<Vec<Ancestor<'_>>> {
        let mut job = self
            .jobs
            .get(name)
            .ok_or_else(|| ConfigError::UnknownJob(name.to_string()))?;

        let mut chain = vec![Ancestor::Defined(job)];
        let mut seen = BTreeSet::from([job.name.as_str()]);

        while let Some(parent) = job.parent.as_deref() {
            if !seen.insert(parent) {
                return Err(ConfigError::CycleDetected(format!(
                    "{} -> {}",
                    job.name, parent
                )));
            }
            if let Some(parent_job) = self.jobs.get(parent) {
                chain.push(Ancestor::Defined(parent_job));
                job = parent_job;
            } else if let Some(external) = self.external.get(parent) {
                chain.push(Ancestor::External(external.as_str()));
                break;
            } else {
                return Err(ConfigError::InvalidReference(format!(
                    "job '{}' has unknown parent '{}'",
                    job.name, parent
                )));
            }
        }

        Ok(chain)
    }

    /// Fail if any inheritance chain loops back on itself.
    pub fn check_acyclic(&self) -> ConfigResult<()> {
        detect_cycle(&self.jobs).map_err(ConfigError::CycleDetected)
    }
}

impl KnownJobs for JobRegistry {
    fn is_known(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Detect cycles in the parent graph using DFS.
fn detect_cycle(jobs: &BTreeMap<String, JobDefinition>) -> Result<(), String> {
    let mut visited = HashMap::new();
    let mut rec_stack = HashMap::new();

    for name in jobs.keys() {
        if !visited.contains_key(name.as_str()) {
            if let Some(cycle) = dfs_detect_cycle(name, jobs, &mut visited, &mut rec_stack) {
                return Err(cycle);
            }
        }
    }
    Ok(())
}

fn dfs_detect_cycle<'a>(
    node: &'a str,
    jobs: &'a BTreeMap<String, JobDefinition>,
    visited: &mut HashMap<&'a str, bool>,
    rec_stack: &mut HashMap<&'a str, bool>,
) -> Option<String> {
    visited.insert(node, true);
    rec_stack.insert(node, true);

    if let Some(parent) = jobs.get(node).and_then(|job| job.parent.as_deref()) {
        if !visited.contains_key(parent) {
            if let Some(cycle) = dfs_detect_cycle(parent, jobs, visited, rec_stack) {
                return Some(cycle);
            }
        } else if rec_stack.get(parent).copied().unwrap_or(false) {
            return Some(format!("{} -> {}", node, parent));
        }
    }

    rec_stack.insert(node, false);
    None
}

//! Loading job documents into a registry.

use crate::job::{ParseOptions, parse_job_with};
use crate::registry::KnownJobs;
use crate::{
    ConfigError, ConfigResult, Format, JobRegistry, LoaderSettings, RawJob, VariableContext,
    document, playbook, resolve,
};
use jobdef_core::JobDescriptor;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads job documents, validates them, and resolves descriptors.
///
/// A load is all-or-nothing: if any job in it fails validation the registry
/// is left as it was.
#[derive(Debug, Clone)]
pub struct Loader {
    registry: JobRegistry,
    settings: LoaderSettings,
}

/// A document waiting to be loaded.
struct Source {
    origin: String,
    jobs: Vec<RawJob>,
}

/// Known jobs during a load: the registry plus the names being loaded.
struct LoadScope<'a> {
    registry: &'a JobRegistry,
    pending: HashSet<String>,
}

impl KnownJobs for LoadScope<'_> {
    fn is_known(&self, name: &str) -> bool {
        self.pending.contains(name) || self.registry.is_known(name)
    }
}

impl Loader {
    pub fn new(settings: LoaderSettings) -> Self {
        let registry = JobRegistry::with_external(settings.external_jobs.iter().cloned());
        Self { registry, settings }
    }

    /// Start from an existing registry.
    pub fn with_registry(registry: JobRegistry, settings: LoaderSettings) -> Self {
        let mut registry = registry;
        for name in &settings.external_jobs {
            registry.declare_external(name.clone());
        }
        Self { registry, settings }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> JobRegistry {
        self.registry
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Load every job in a document. Returns the loaded job names.
    pub fn load_str(&mut self, text: &str, format: Format) -> ConfigResult<Vec<String>> {
        let source = Source {
            origin: "<string>".to_string(),
            jobs: document::read_document(text, format)?,
        };
        self.load_sources(vec![source])
    }

    /// Load a single file; the format comes from its extension.
    pub fn load_file(&mut self, path: &Path) -> ConfigResult<Vec<String>> {
        let source = read_source(path)?;
        self.load_sources(vec![source])
    }

    /// Load every `.yaml`, `.yml` and `.kdl` file in a directory tree.
    ///
    /// Files are read in path order and loaded together, so a parent may be
    /// defined in any of them.
    pub fn load_dir(&mut self, dir: &Path) -> ConfigResult<Vec<String>> {
        let sources = dir_sources(dir)?;
        self.load_sources(sources)
    }

    /// Load a file or a directory.
    pub fn load_path(&mut self, path: &Path) -> ConfigResult<Vec<String>> {
        self.load_paths(&[path.to_path_buf()])
    }

    /// Load several files and directories as a single load.
    ///
    /// Parents may be defined in any of them, in any order, and nothing is
    /// loaded unless every path loads.
    pub fn load_paths(&mut self, paths: &[PathBuf]) -> ConfigResult<Vec<String>> {
        let mut sources = Vec::new();
        for path in paths {
            if path.is_dir() {
                sources.extend(dir_sources(path)?);
            } else {
                sources.push(read_source(path)?);
            }
        }
        self.load_sources(sources)
    }

    /// Resolve a loaded job into its descriptor.
    pub fn resolve(&self, name: &str) -> ConfigResult<JobDescriptor> {
        self.resolve_in(&self.registry, name, &self.variable_context())
    }

    /// Resolve every loaded job, sorted by name.
    pub fn resolve_all(&self) -> ConfigResult<Vec<JobDescriptor>> {
        let ctx = self.variable_context();
        self.registry
            .names()
            .map(|name| self.resolve_in(&self.registry, name, &ctx))
            .collect()
    }

    fn resolve_in(
        &self,
        registry: &JobRegistry,
        name: &str,
        ctx: &VariableContext,
    ) -> ConfigResult<JobDescriptor> {
        let descriptor = resolve::resolve(registry, name, ctx, self.settings.default_timeout)?;
        if let Some(root) = &self.settings.playbook_root {
            playbook::check_descriptor(root, &descriptor)?;
        }
        Ok(descriptor)
    }

    fn variable_context(&self) -> VariableContext {
        let mut ctx = VariableContext::new();
        if self.settings.interpolate_env {
            ctx.populate_env();
        }
        ctx
    }

    fn load_sources(&mut self, sources: Vec<Source>) -> ConfigResult<Vec<String>> {
        let mut pending = HashSet::new();
        for source in &sources {
            for raw in &source.jobs {
                if let Some(name) = raw.get("name").and_then(|n| n.as_str()) {
                    let name = name.trim();
                    if !pending.insert(name.to_string()) {
                        return Err(ConfigError::Duplicate(format!(
                            "job '{}' in {}",
                            name, source.origin
                        )));
                    }
                }
            }
        }

        let scope = LoadScope {
            registry: &self.registry,
            pending,
        };
        let options = ParseOptions {
            strict: self.settings.strict,
        };

        let mut next = self.registry.clone();
        let mut loaded = Vec::new();

        for source in &sources {
            for raw in &source.jobs {
                let job = parse_job_with(raw, &scope, &options)?;
                if let Some(root) = &self.settings.playbook_root {
                    playbook::check_job(root, &job)?;
                }
                debug!(job = %job.name, origin = %source.origin, "parsed job");
                loaded.push(job.name.clone());
                next.insert(job)?;
            }
        }

        next.check_acyclic()?;

        // Templated playbook paths are only known once the chain is merged.
        if self.settings.playbook_root.is_some() {
            let ctx = self.variable_context();
            for name in &loaded {
                self.resolve_in(&next, name, &ctx)?;
            }
        }
        self.registry = next;

        info!(
            jobs = loaded.len(),
            sources = sources.len(),
            total = self.registry.len(),
            "loaded job definitions"
        );
        Ok(loaded)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(LoaderSettings::default())
    }
}

fn read_source(path: &Path) -> ConfigResult<Source> {
    let format = Format::from_path(path).ok_or_else(|| {
        ConfigError::invalid(
            "path",
            format!("cannot tell document format of {}", path.display()),
        )
    })?;
    let text = std::fs::read_to_string(path)?;
    Ok(Source {
        origin: path.display().to_string(),
        jobs: document::read_document(&text, format)?,
    })
}

fn dir_sources(dir: &Path) -> ConfigResult<Vec<Source>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    files.iter().map(|path| read_source(path)).collect()
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> ConfigResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if Format::from_path(&path).is_some() {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RALLY_YAML: &str = r#"
- job:
    name: rally-task-at-devstack
    parent: devstack
    description: Run a Rally task against devstack
    required-projects:
      - openstack/devstack
      - openstack/rally
    timeout: 7200
    roles:
      - zuul: openstack/devstack
    vars:
      rally_task: rally-jobs/task.yaml
    run: tests/ci/playbooks/run-rally-task.yaml
    post-run: tests/ci/playbooks/post-rally-task.yaml
"#;

    fn settings() -> LoaderSettings {
        LoaderSettings {
            external_jobs: vec!["devstack".to_string()],
            ..LoaderSettings::default()
        }
    }

    #[test]
    fn test_load_str() {
        let mut loader = Loader::new(settings());
        let names = loader.load_str(RALLY_YAML, Format::Yaml).unwrap();
        assert_eq!(names, vec!["rally-task-at-devstack"]);
        assert!(loader.registry().get("rally-task-at-devstack").is_some());
    }

    #[test]
    fn test_forward_parent_reference() {
        let yaml = r#"
- job:
    name: child
    parent: parent
    run: child.yaml
- job:
    name: parent
    run: parent.yaml
"#;
        let mut loader = Loader::default();
        let names = loader.load_str(yaml, Format::Yaml).unwrap();
        assert_eq!(names, vec!["child", "parent"]);
    }

    #[test]
    fn test_unknown_parent_without_external() {
        let mut loader = Loader::default();
        let result = loader.load_str(RALLY_YAML, Format::Yaml);
        assert!(matches!(result, Err(ConfigError::InvalidReference(_))));
        assert!(loader.registry().is_empty());
    }

    #[test]
    fn test_duplicate_within_document() {
        let yaml = r#"
- job: {name: twin, run: a.yaml}
- job: {name: twin, run: b.yaml}
"#;
        let mut loader = Loader::default();
        let result = loader.load_str(yaml, Format::Yaml);
        assert!(matches!(result, Err(ConfigError::Duplicate(_))));
    }

    #[test]
    fn test_duplicate_across_loads() {
        let mut loader = Loader::new(settings());
        loader.load_str(RALLY_YAML, Format::Yaml).unwrap();
        let result = loader.load_str(RALLY_YAML, Format::Yaml);
        assert!(matches!(result, Err(ConfigError::Duplicate(_))));
        assert_eq!(loader.registry().len(), 1);
    }

    #[test]
    fn test_cycle_detected() {
        let yaml = r#"
- job: {name: a, parent: b, run: a.yaml}
- job: {name: b, parent: a, run: b.yaml}
"#;
        let mut loader = Loader::default();
        let result = loader.load_str(yaml, Format::Yaml);
        assert!(matches!(result, Err(ConfigError::CycleDetected(_))));
        assert!(loader.registry().is_empty());
    }

    #[test]
    fn test_failed_load_is_atomic() {
        let yaml = r#"
- job: {name: good, run: good.yaml}
- job: {name: bad}
"#;
        let mut loader = Loader::default();
        let result = loader.load_str(yaml, Format::Yaml);
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
        assert!(loader.registry().get("good").is_none());
    }

    #[test]
    fn test_resolve_uses_default_timeout() {
        let mut loader = Loader::new(LoaderSettings {
            default_timeout: std::time::Duration::from_secs(900),
            ..LoaderSettings::default()
        });
        loader
            .load_str("- job: {name: quick, run: quick.yaml}", Format::Yaml)
            .unwrap();
        let descriptor = loader.resolve("quick").unwrap();
        assert_eq!(descriptor.timeout.as_secs(), 900);
    }

    #[test]
    fn test_with_registry_keeps_jobs() {
        let mut first = Loader::new(settings());
        first.load_str(RALLY_YAML, Format::Yaml).unwrap();

        let mut second = Loader::with_registry(first.into_registry(), LoaderSettings::default());
        let yaml = r#"
- job:
    name: rally-extended
    parent: rally-task-at-devstack
    run: extended.yaml
"#;
        second.load_str(yaml, Format::Yaml).unwrap();
        let descriptor = second.resolve("rally-extended").unwrap();
        assert_eq!(
            descriptor.inheritance,
            vec!["rally-extended", "rally-task-at-devstack", "devstack"]
        );
    }
}

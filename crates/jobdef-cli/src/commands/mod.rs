//! CLI command implementations.

pub mod jobs;

use anyhow::{Context, Result};
use jobdef_config::settings::load_loader_settings;
use jobdef_config::{Loader, LoaderSettings};
use std::path::PathBuf;
use tracing::debug;

/// Settings file picked up from the working directory when none is given.
const DEFAULT_CONFIG: &str = "jobdef.kdl";

/// Global options shared by every command.
pub struct Options {
    pub config: Option<PathBuf>,
    pub playbook_root: Option<PathBuf>,
    pub external: Vec<String>,
    pub strict: bool,
}

impl Options {
    /// Loader settings from the settings file, overridden by flags.
    pub fn settings(&self) -> Result<LoaderSettings> {
        let config = match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG);
                path.is_file().then_some(path)
            }
        };

        let mut settings = match &config {
            Some(path) => {
                debug!(path = %path.display(), "reading loader settings");
                load_loader_settings(path)
                    .with_context(|| format!("Failed to read settings: {}", path.display()))?
            }
            None => LoaderSettings::default(),
        };

        if let Some(root) = &self.playbook_root {
            settings.playbook_root = Some(root.clone());
        }
        settings.external_jobs.extend(self.external.iter().cloned());
        settings.strict |= self.strict;

        Ok(settings)
    }
}

/// Build a loader and load every path into it as one load.
pub(crate) fn load(settings: LoaderSettings, paths: &[PathBuf]) -> Result<Loader> {
    let mut loader = Loader::new(settings);
    loader
        .load_paths(paths)
        .with_context(|| format!("Failed to load job definitions: {}", display_paths(paths)))?;
    Ok(loader)
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn validate(options: &Options, paths: &[PathBuf]) -> Result<()> {
    let settings = options.settings()?;
    match load(settings, paths) {
        Ok(loader) => {
            println!("Configuration is valid ({} jobs)", loader.registry().len());
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("jobdef.kdl");
        std::fs::write(
            &config,
            "playbook-root \"ci\"\nexternal-job \"base\"\ndefault-timeout 600\n",
        )
        .unwrap();

        let options = Options {
            config: Some(config),
            playbook_root: Some(PathBuf::from("/srv/project")),
            external: vec!["devstack".to_string()],
            strict: true,
        };

        let settings = options.settings().unwrap();
        assert_eq!(settings.playbook_root, Some(PathBuf::from("/srv/project")));
        assert_eq!(settings.external_jobs, vec!["base", "devstack"]);
        assert_eq!(settings.default_timeout.as_secs(), 600);
        assert!(settings.strict);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.yaml");
        std::fs::write(&path, "- job: {name: orphan, parent: nowhere, run: run.yaml}\n").unwrap();

        let err = load(LoaderSettings::default(), &[path.clone()]).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains(&path.display().to_string()));
        assert!(message.contains("nowhere"));
    }

    #[test]
    fn test_paths_load_together_in_any_order() {
        let dir = TempDir::new().unwrap();
        let child = dir.path().join("child.yaml");
        let parent = dir.path().join("parent.yaml");
        std::fs::write(&child, "- job: {name: child, parent: base-job, run: child.yaml}\n").unwrap();
        std::fs::write(&parent, "- job: {name: base-job, run: base.yaml}\n").unwrap();

        let loader = load(LoaderSettings::default(), &[child.clone(), parent.clone()]).unwrap();
        assert_eq!(loader.registry().len(), 2);
        let descriptor = loader.resolve("child").unwrap();
        assert_eq!(descriptor.inheritance, vec!["child", "base-job"]);

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "- job: {name: broken}\n").unwrap();
        assert!(load(LoaderSettings::default(), &[child, parent, broken]).is_err());
    }
}

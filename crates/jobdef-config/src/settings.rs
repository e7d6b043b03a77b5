//! Loader settings.
//!
//! Read from a KDL file (conventionally `jobdef.kdl`):
//!
//! ```kdl
//! playbook-root "."
//! default-timeout 3600
//! strict #false
//! interpolate-env #false
//! external-job "base" "devstack"
//! ```

use crate::{ConfigError, ConfigResult};
use jobdef_core::timeout;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timeout for jobs whose whole inheritance chain leaves it unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// How the loader validates and resolves jobs.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Directory playbook paths are checked against. No check when unset.
    pub playbook_root: Option<PathBuf>,
    /// Timeout used when no job in the chain sets one.
    pub default_timeout: Duration,
    /// Reject unknown job attributes.
    pub strict: bool,
    /// Expose the process environment as `${env.*}`.
    pub interpolate_env: bool,
    /// Jobs defined elsewhere that may be used as parents.
    pub external_jobs: Vec<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            playbook_root: None,
            default_timeout: DEFAULT_TIMEOUT,
            strict: false,
            interpolate_env: false,
            external_jobs: Vec::new(),
        }
    }
}

/// Parse loader settings from KDL text.
pub fn parse_loader_settings(kdl: &str) -> ConfigResult<LoaderSettings> {
    let doc: KdlDocument = kdl.parse()?;
    let mut settings = LoaderSettings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "playbook-root" => {
                let root = get_first_string_arg(node).ok_or_else(|| {
                    ConfigError::MissingSetting("playbook-root path".to_string())
                })?;
                settings.playbook_root = Some(PathBuf::from(root));
            }
            "default-timeout" => {
                settings.default_timeout = match get_first_arg(node) {
                    Some(KdlValue::Integer(secs)) => {
                        let secs = i64::try_from(*secs).map_err(|_| {
                            ConfigError::invalid("default-timeout", "value out of range")
                        })?;
                        timeout::from_secs(secs)?
                    }
                    Some(KdlValue::String(s)) => timeout::parse_timeout(s)?,
                    _ => {
                        return Err(ConfigError::MissingSetting(
                            "default-timeout value".to_string(),
                        ));
                    }
                };
            }
            "strict" => {
                settings.strict = get_bool_arg(node, "strict")?;
            }
            "interpolate-env" => {
                settings.interpolate_env = get_bool_arg(node, "interpolate-env")?;
            }
            "external-job" | "external-jobs" => {
                settings.external_jobs.extend(get_all_string_args(node));
            }
            other => {
                return Err(ConfigError::invalid(
                    "settings",
                    format!("unknown setting: {}", other),
                ));
            }
        }
    }

    Ok(settings)
}

/// Read loader settings from a file.
///
/// A relative `playbook-root` is taken relative to the settings file.
pub fn load_loader_settings(path: &Path) -> ConfigResult<LoaderSettings> {
    let content = std::fs::read_to_string(path)?;
    let mut settings = parse_loader_settings(&content)?;

    if let (Some(root), Some(dir)) = (&settings.playbook_root, path.parent()) {
        if root.is_relative() {
            settings.playbook_root = Some(dir.join(root));
        }
    }

    Ok(settings)
}

fn get_first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    get_first_arg(node)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_bool_arg(node: &KdlNode, setting: &str) -> ConfigResult<bool> {
    match get_first_arg(node) {
        None => Ok(true),
        Some(value) => value
            .as_bool()
            .ok_or_else(|| ConfigError::invalid(setting, "expected a boolean")),
    }
}

//! Parsing raw job mappings into validated definitions.

use crate::registry::KnownJobs;
use crate::{ConfigError, ConfigResult, RawJob};
use jobdef_core::{JobDefinition, PlaybookPath, ProjectRef, RoleBinding, timeout};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Attributes a job mapping may carry.
pub const KNOWN_ATTRIBUTES: &[&str] = &[
    "name",
    "parent",
    "description",
    "required-projects",
    "timeout",
    "roles",
    "vars",
    "run",
    "post-run",
];

/// Knobs for [`parse_job_with`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Reject attributes outside [`KNOWN_ATTRIBUTES`] instead of ignoring them.
    pub strict: bool,
}

/// Parse a raw job mapping with default options.
pub fn parse_job(raw: &RawJob, known: &impl KnownJobs) -> ConfigResult<JobDefinition> {
    parse_job_with(raw, known, &ParseOptions::default())
}

/// Parse a raw job mapping.
///
/// `name` and `run` are required; `parent`, when given, must name a job
/// known to `known`.
pub fn parse_job_with(
    raw: &RawJob,
    known: &impl KnownJobs,
    options: &ParseOptions,
) -> ConfigResult<JobDefinition> {
    let name = get_string(raw, "name", "job")?
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ConfigError::MalformedConfig("job is missing required field 'name'".to_string()))?;
    let name = name.trim().to_string();
    let ctx = format!("job '{}'", name);

    for key in raw.keys() {
        if !KNOWN_ATTRIBUTES.contains(&key.as_str()) {
            if options.strict {
                return Err(ConfigError::MalformedConfig(format!(
                    "{} has unknown attribute '{}'",
                    ctx, key
                )));
            }
            warn!(job = %name, attribute = %key, "ignoring unknown attribute");
        }
    }

    let run = get_string(raw, "run", &ctx)?
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::MalformedConfig(format!("{} is missing required field 'run'", ctx))
        })?;
    let run = playbook(&run, "run", &ctx)?;

    let post_run = get_string(raw, "post-run", &ctx)?
        .map(|p| playbook(&p, "post-run", &ctx))
        .transpose()?;

    let parent = get_string(raw, "parent", &ctx)?;
    if let Some(parent) = &parent {
        if parent == &name {
            return Err(ConfigError::InvalidReference(format!(
                "{} cannot inherit from itself",
                ctx
            )));
        }
        if !known.is_known(parent) {
            return Err(ConfigError::InvalidReference(format!(
                "{} has unknown parent '{}'",
                ctx, parent
            )));
        }
    }

    let mut job = JobDefinition::new(name, run);
    job.parent = parent;
    job.description = get_string(raw, "description", &ctx)?;
    job.timeout = parse_timeout(raw.get("timeout"), &ctx)?;
    job.required_projects = parse_projects(raw.get("required-projects"), &ctx)?;
    job.roles = parse_roles(raw.get("roles"), &ctx)?;
    job.vars = parse_vars(raw.get("vars"), &ctx)?;
    job.post_run = post_run;

    job.validate()?;
    Ok(job)
}

fn playbook(path: &str, field: &str, ctx: &str) -> ConfigResult<PlaybookPath> {
    PlaybookPath::new(path)
        .map_err(|e| ConfigError::invalid(format!("{} of {}", field, ctx), e.to_string()))
}

fn parse_timeout(value: Option<&Value>, ctx: &str) -> ConfigResult<Option<Duration>> {
    let field = || format!("timeout of {}", ctx);

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let secs = n.as_i64().ok_or_else(|| {
                ConfigError::invalid(field(), format!("expected whole seconds, got {}", n))
            })?;
            timeout::from_secs(secs)
                .map(Some)
                .map_err(|e| ConfigError::invalid(field(), e.to_string()))
        }
        Some(Value::String(s)) => timeout::parse_timeout(s)
            .map(Some)
            .map_err(|e| ConfigError::invalid(field(), e.to_string())),
        Some(other) => Err(ConfigError::invalid(
            field(),
            format!("expected seconds or a duration, got {}", type_name(other)),
        )),
    }
}

fn parse_projects(value: Option<&Value>, ctx: &str) -> ConfigResult<Vec<ProjectRef>> {
    let Some(items) = get_list(value, "required-projects", ctx)? else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.parse::<ProjectRef>().map_err(ConfigError::from),
            Value::Object(map) => {
                for key in map.keys() {
                    if key != "name" && key != "override-checkout" {
                        return Err(ConfigError::MalformedConfig(format!(
                            "required project in {} has unknown attribute '{}'",
                            ctx, key
                        )));
                    }
                }
                let name = get_string(map, "name", ctx)?.ok_or_else(|| {
                    ConfigError::MalformedConfig(format!(
                        "required project in {} is missing 'name'",
                        ctx
                    ))
                })?;
                let mut project: ProjectRef = name.parse()?;
                project.override_checkout = get_string(map, "override-checkout", ctx)?;
                Ok(project)
            }
            other => Err(ConfigError::MalformedConfig(format!(
                "required project in {} must be a name or a mapping, got {}",
                ctx,
                type_name(other)
            ))),
        })
        .collect()
}

fn parse_roles(value: Option<&Value>, ctx: &str) -> ConfigResult<Vec<RoleBinding>> {
    let Some(items) = get_list(value, "roles", ctx)? else {
        return Ok(Vec::new());
    };

    items
        .iter()
        .map(|item| {
            let Value::Object(map) = item else {
                return Err(ConfigError::MalformedConfig(format!(
                    "role in {} must be a mapping, got {}",
                    ctx,
                    type_name(item)
                )));
            };

            let allowed: &[&str] = if map.contains_key("zuul") {
                &["zuul", "name"]
            } else {
                &["galaxy"]
            };
            for key in map.keys() {
                if !allowed.contains(&key.as_str()) {
                    return Err(ConfigError::MalformedConfig(format!(
                        "role in {} has unknown attribute '{}'",
                        ctx, key
                    )));
                }
            }

            if let Some(project) = get_string(map, "zuul", ctx)? {
                Ok(RoleBinding::Zuul {
                    project,
                    name: get_string(map, "name", ctx)?,
                })
            } else if let Some(name) = get_string(map, "galaxy", ctx)? {
                Ok(RoleBinding::Galaxy { name })
            } else {
                Err(ConfigError::MalformedConfig(format!(
                    "role in {} must have a 'zuul' or 'galaxy' key",
                    ctx
                )))
            }
        })
        .collect()
}

fn parse_vars(value: Option<&Value>, ctx: &str) -> ConfigResult<BTreeMap<String, Value>> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(other) => Err(ConfigError::MalformedConfig(format!(
            "vars of {} must be a mapping, got {}",
            ctx,
            type_name(other)
        ))),
    }
}

// Helper functions for extracting values from raw mappings

fn get_string(map: &RawJob, key: &str, ctx: &str) -> ConfigResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigError::MalformedConfig(format!(
            "'{}' of {} must be a string, got {}",
            key,
            ctx,
            type_name(other)
        ))),
    }
}

fn get_list<'a>(
    value: Option<&'a Value>,
    key: &str,
    ctx: &str,
) -> ConfigResult<Option<&'a Vec<Value>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(ConfigError::MalformedConfig(format!(
            "'{}' of {} must be a list, got {}",
            key,
            ctx,
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobRegistry;
    use serde_json::json;

    fn raw(value: Value) -> RawJob {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be a mapping"),
        }
    }

    fn registry() -> JobRegistry {
        JobRegistry::with_external(["devstack", "base"])
    }

    fn rally_raw() -> RawJob {
        raw(json!({
            "name": "rally-task-at-devstack",
            "parent": "devstack",
            "description": "Run a Rally task against a devstack deployment",
            "required-projects": [
                "openstack/devstack",
                "openstack/rally",
                {"name": "openstack/rally-openstack", "override-checkout": "master"}
            ],
            "timeout": 7200,
            "roles": [{"zuul": "openstack/devstack"}],
            "vars": {
                "rally_task": "rally-jobs/task.yaml",
                "devstack_plugins": {
                    "rally-openstack": "https://opendev.org/openstack/rally-openstack"
                }
            },
            "run": "tests/ci/playbooks/run-rally-task.yaml",
            "post-run": "tests/ci/playbooks/post-rally-task.yaml"
        }))
    }

    #[test]
    fn test_parse_full_job() {
        let job = parse_job(&rally_raw(), &registry()).unwrap();
        assert_eq!(job.name, "rally-task-at-devstack");
        assert_eq!(job.parent.as_deref(), Some("devstack"));
        assert_eq!(job.timeout, Some(Duration::from_secs(7200)));
        assert_eq!(job.required_projects.len(), 3);
        assert_eq!(
            job.required_projects[2].override_checkout.as_deref(),
            Some("master")
        );
        assert_eq!(job.roles, vec![RoleBinding::zuul("openstack/devstack")]);
        assert_eq!(job.vars["rally_task"], json!("rally-jobs/task.yaml"));
        assert_eq!(job.run.as_str(), "tests/ci/playbooks/run-rally-task.yaml");
        assert_eq!(
            job.post_run.as_ref().map(|p| p.as_str()),
            Some("tests/ci/playbooks/post-rally-task.yaml")
        );
    }

    #[test]
    fn test_missing_run() {
        let mut raw = rally_raw();
        raw.remove("run");
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_empty_run() {
        let mut raw = rally_raw();
        raw.insert("run".to_string(), json!("  "));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_missing_name() {
        let mut raw = rally_raw();
        raw.remove("name");
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_name_wrong_type() {
        let mut raw = rally_raw();
        raw.insert("name".to_string(), json!(5));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_unknown_parent() {
        let mut raw = rally_raw();
        raw.insert("parent".to_string(), json!("tempest"));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::InvalidReference(_))));
    }

    #[test]
    fn test_self_parent() {
        let mut raw = rally_raw();
        raw.insert("parent".to_string(), json!("rally-task-at-devstack"));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::InvalidReference(_))));
    }

    #[test]
    fn test_negative_timeout() {
        let mut raw = rally_raw();
        raw.insert("timeout".to_string(), json!(-1));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_timeout_forms() {
        let mut raw = rally_raw();
        raw.insert("timeout".to_string(), json!("1h30m"));
        let job = parse_job(&raw, &registry()).unwrap();
        assert_eq!(job.timeout, Some(Duration::from_secs(5400)));

        raw.insert("timeout".to_string(), json!(1.5));
        assert!(matches!(
            parse_job(&raw, &registry()),
            Err(ConfigError::InvalidValue { .. })
        ));

        raw.insert("timeout".to_string(), json!(true));
        assert!(matches!(
            parse_job(&raw, &registry()),
            Err(ConfigError::InvalidValue { .. })
        ));

        raw.remove("timeout");
        assert_eq!(parse_job(&raw, &registry()).unwrap().timeout, None);
    }

    #[test]
    fn test_absolute_playbook_rejected() {
        let mut raw = rally_raw();
        raw.insert("post-run".to_string(), json!("/tmp/post.yaml"));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_duplicate_project() {
        let mut raw = rally_raw();
        raw.insert(
            "required-projects".to_string(),
            json!(["openstack/rally", {"name": "openstack/rally"}]),
        );
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_bad_role() {
        let mut raw = rally_raw();
        raw.insert("roles".to_string(), json!([{"git": "example.org/roles"}]));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));

        raw.insert("roles".to_string(), json!(["openstack/devstack"]));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_vars_must_be_mapping() {
        let mut raw = rally_raw();
        raw.insert("vars".to_string(), json!(["a", "b"]));
        let result = parse_job(&raw, &registry());
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_unknown_attribute_lenient_and_strict() {
        let mut raw = rally_raw();
        raw.insert("nodeset".to_string(), json!("ubuntu-jammy"));

        assert!(parse_job(&raw, &registry()).is_ok());

        let strict = ParseOptions { strict: true };
        let result = parse_job_with(&raw, &registry(), &strict);
        assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
    }

    #[test]
    fn test_serialize_then_parse_is_identical() {
        let job = parse_job(&rally_raw(), &registry()).unwrap();
        let value = serde_json::to_value(&job).unwrap();
        let again = parse_job(&raw(value), &registry()).unwrap();
        assert_eq!(again, job);
    }

    #[test]
    fn test_role_unknown_key_rejected() {
        for role in [
            json!({"zuul": "openstack/devstack", "galxy": "x"}),
            json!({"zuul": "openstack/devstack", "galaxy": "x"}),
            json!({"galaxy": "geerlingguy.pip", "name": "pip"}),
        ] {
            let mut raw = rally_raw();
            raw.insert("roles".to_string(), json!([role]));
            let result = parse_job(&raw, &registry());
            assert!(matches!(result, Err(ConfigError::MalformedConfig(_))));
        }
    }
}

//! Flattening a job and its ancestors into a descriptor.
//!
//! Merge rules, applied from the root of the chain down to the job:
//! - `description`, `timeout`: nearest value wins
//! - `vars`: deep merge, the child's keys override
//! - `required-projects`: union keyed by project name, the child's checkout wins
//! - `roles`: union in order of first appearance
//! - `run`: the job's own
//! - `post-run`: the job's own first, then each ancestor's
//!
//! External ancestors contribute nothing but are listed in the inheritance.

use crate::registry::Ancestor;
use crate::{ConfigError, ConfigResult, JobRegistry, VariableContext};
use jobdef_core::{JobDefinition, JobDescriptor, PlaybookPath, ProjectRef, RoleBinding};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Resolve a loaded job into its descriptor.
pub fn resolve(
    registry: &JobRegistry,
    name: &str,
    ctx: &VariableContext,
    default_timeout: Duration,
) -> ConfigResult<JobDescriptor> {
    let chain = registry.ancestors(name)?;
    let inheritance: Vec<String> = chain.iter().map(|a| a.name().to_string()).collect();

    let defined: Vec<&JobDefinition> = chain
        .iter()
        .filter_map(|a| match a {
            Ancestor::Defined(job) => Some(*job),
            Ancestor::External(_) => None,
        })
        .collect();
    let Some(job) = defined.first().copied() else {
        return Err(ConfigError::UnknownJob(name.to_string()));
    };

    let description = defined.iter().find_map(|j| j.description.clone());
    let timeout = defined
        .iter()
        .find_map(|j| j.timeout)
        .unwrap_or(default_timeout);

    let mut vars = BTreeMap::new();
    let mut required_projects: Vec<ProjectRef> = Vec::new();
    let mut roles: Vec<RoleBinding> = Vec::new();

    for ancestor in defined.iter().rev() {
        for (key, value) in &ancestor.vars {
            merge_var(&mut vars, key, value);
        }
        for project in &ancestor.required_projects {
            match required_projects.iter_mut().find(|p| p.name == project.name) {
                Some(existing) => {
                    if project.override_checkout.is_some() {
                        existing.override_checkout = project.override_checkout.clone();
                    }
                }
                None => required_projects.push(project.clone()),
            }
        }
        for role in &ancestor.roles {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
    }

    let ctx = ctx.for_job(&job.name, job.parent.as_deref(), &vars);
    for (key, value) in &vars {
        if let Value::String(s) = value {
            for unresolved in ctx.unresolved(s) {
                debug!(job = %job.name, var = %key, reference = %unresolved, "unresolved variable");
            }
        }
    }

    let run = interpolate_playbook(&ctx, &job.run, "run", &job.name)?;
    let post_run = defined
        .iter()
        .filter_map(|j| j.post_run.as_ref())
        .map(|p| interpolate_playbook(&ctx, p, "post-run", &job.name))
        .collect::<ConfigResult<Vec<_>>>()?;

    Ok(JobDescriptor {
        name: job.name.clone(),
        description: description.map(|d| ctx.interpolate(&d)),
        inheritance,
        required_projects,
        timeout,
        roles,
        vars: ctx.interpolate_map(&vars),
        run,
        post_run,
    })
}

/// Resolve every loaded job, sorted by name.
pub fn resolve_all(
    registry: &JobRegistry,
    ctx: &VariableContext,
    default_timeout: Duration,
) -> ConfigResult<Vec<JobDescriptor>> {
    registry
        .names()
        .map(|name| resolve(registry, name, ctx, default_timeout))
        .collect()
}

fn merge_var(target: &mut BTreeMap<String, Value>, key: &str, value: &Value) {
    if let (Some(Value::Object(existing)), Value::Object(incoming)) = (target.get_mut(key), value) {
        for (k, v) in incoming {
            merge_value(existing, k, v);
        }
        return;
    }
    target.insert(key.to_string(), value.clone());
}

// Nested mappings merge recursively; anything else is replaced.
fn merge_value(target: &mut serde_json::Map<String, Value>, key: &str, value: &Value) {
    match (target.get_mut(key), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (k, v) in incoming {
                merge_value(existing, k, v);
            }
        }
        _ => {
            target.insert(key.to_string(), value.clone());
        }
    }
}

fn interpolate_playbook(
    ctx: &VariableContext,
    playbook: &PlaybookPath,
    field: &str,
    job: &str,
) -> ConfigResult<PlaybookPath> {
    let interpolated = ctx.interpolate(playbook.as_str());
    if interpolated == playbook.as_str() {
        return Ok(playbook.clone());
    }
    PlaybookPath::new(interpolated).map_err(|e| {
        ConfigError::invalid(format!("{} of job '{}'", field, job), e.to_string())
    })
}

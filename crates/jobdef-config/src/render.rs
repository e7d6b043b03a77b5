//! Rendering job definitions back into documents.
//!
//! Loading a rendered document yields the same definitions. In KDL, an empty
//! list inside `vars` comes back as an empty mapping, since both are written
//! as an empty block.

use crate::ConfigResult;
use jobdef_core::{JobDefinition, RoleBinding};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Entry<'a> {
    job: &'a JobDefinition,
}

/// Render jobs as a CI-layout YAML document.
pub fn render_yaml<'a>(jobs: impl IntoIterator<Item = &'a JobDefinition>) -> ConfigResult<String> {
    let entries: Vec<Entry<'_>> = jobs.into_iter().map(|job| Entry { job }).collect();
    Ok(serde_yaml::to_string(&entries)?)
}

/// Render jobs as a KDL document.
pub fn render_kdl<'a>(jobs: impl IntoIterator<Item = &'a JobDefinition>) -> String {
    let mut doc = KdlDocument::new();
    for job in jobs {
        doc.nodes_mut().push(job_node(job));
    }
    doc.autoformat();
    doc.to_string()
}

fn job_node(job: &JobDefinition) -> KdlNode {
    let mut node = KdlNode::new("job");
    node.push(KdlEntry::new(KdlValue::String(job.name.clone())));

    let mut children = KdlDocument::new();
    let nodes = children.nodes_mut();

    if let Some(parent) = &job.parent {
        nodes.push(string_node("parent", parent));
    }
    if let Some(description) = &job.description {
        nodes.push(string_node("description", description));
    }
    if !job.required_projects.is_empty() {
        let mut projects = KdlNode::new("required-projects");
        let mut overrides = KdlDocument::new();
        for project in &job.required_projects {
            match &project.override_checkout {
                None => projects.push(KdlEntry::new(KdlValue::String(project.name.clone()))),
                Some(checkout) => {
                    let mut entry = string_node("project", &project.name);
                    entry.push(KdlEntry::new_prop(
                        "override-checkout",
                        KdlValue::String(checkout.clone()),
                    ));
                    overrides.nodes_mut().push(entry);
                }
            }
        }
        if !overrides.nodes().is_empty() {
            projects.set_children(overrides);
        }
        nodes.push(projects);
    }
    if let Some(timeout) = job.timeout {
        let mut seconds = KdlNode::new("timeout");
        seconds.push(KdlEntry::new(KdlValue::Integer(timeout.as_secs() as i128)));
        nodes.push(seconds);
    }
    if !job.roles.is_empty() {
        let mut roles = KdlNode::new("roles");
        let mut bindings = KdlDocument::new();
        for role in &job.roles {
            let binding = match role {
                RoleBinding::Zuul { project, name } => {
                    let mut binding = string_node("zuul", project);
                    if let Some(name) = name {
                        binding.push(KdlEntry::new_prop("name", KdlValue::String(name.clone())));
                    }
                    binding
                }
                RoleBinding::Galaxy { name } => string_node("galaxy", name),
            };
            bindings.nodes_mut().push(binding);
        }
        roles.set_children(bindings);
        nodes.push(roles);
    }
    if !job.vars.is_empty() {
        let mut vars = KdlNode::new("vars");
        let mut entries = KdlDocument::new();
        for (key, value) in &job.vars {
            entries.nodes_mut().push(value_node(key, value));
        }
        vars.set_children(entries);
        nodes.push(vars);
    }
    nodes.push(string_node("run", job.run.as_str()));
    if let Some(post_run) = &job.post_run {
        nodes.push(string_node("post-run", post_run.as_str()));
    }

    node.set_children(children);
    node
}

fn string_node(name: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}

fn value_node(name: &str, value: &Value) -> KdlNode {
    let mut node = KdlNode::new(name);
    match value {
        Value::Null => {}
        Value::Bool(b) => node.push(KdlEntry::new(KdlValue::Bool(*b))),
        Value::Number(n) => {
            let value = if let Some(i) = n.as_i64() {
                KdlValue::Integer(i as i128)
            } else if let Some(u) = n.as_u64() {
                KdlValue::Integer(u as i128)
            } else {
                KdlValue::Float(n.as_f64().unwrap_or_default())
            };
            node.push(KdlEntry::new(value));
        }
        Value::String(s) => node.push(KdlEntry::new(KdlValue::String(s.clone()))),
        Value::Array(items) => {
            let mut children = KdlDocument::new();
            for item in items {
                children.nodes_mut().push(value_node("-", item));
            }
            node.set_children(children);
        }
        Value::Object(map) => {
            let mut children = KdlDocument::new();
            for (key, item) in map {
                children.nodes_mut().push(value_node(key, item));
            }
            node.set_children(children);
        }
    }
    node
}

//! Reading job documents.
//!
//! Two layouts are understood:
//!
//! YAML, as used by CI systems: a list of single-key entries, where only
//! `job` entries are of interest.
//!
//! ```yaml
//! - job:
//!     name: rally-task-at-devstack
//!     parent: devstack
//!     run: tests/ci/playbooks/run-rally-task.yaml
//! ```
//!
//! KDL, one `job` node per job:
//!
//! ```kdl
//! job "rally-task-at-devstack" {
//!     parent "devstack"
//!     run "tests/ci/playbooks/run-rally-task.yaml"
//! }
//! ```
//!
//! Both produce [`RawJob`] mappings with the same keys, which are then
//! validated by [`crate::parse_job`].

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode, KdlValue};
use serde_json::{Map, Number, Value};
use std::path::Path;
use tracing::debug;

/// An unvalidated job: attribute name to value.
pub type RawJob = Map<String, Value>;

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Kdl,
}

impl Format {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            Some("kdl") => Some(Format::Kdl),
            _ => None,
        }
    }
}

impl std::str::FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "kdl" => Ok(Format::Kdl),
            other => Err(ConfigError::invalid(
                "format",
                format!("unknown document format: {}", other),
            )),
        }
    }
}

/// Read every job in a document.
pub fn read_document(text: &str, format: Format) -> ConfigResult<Vec<RawJob>> {
    match format {
        Format::Yaml => read_yaml(text),
        Format::Kdl => read_kdl(text),
    }
}

fn read_yaml(text: &str) -> ConfigResult<Vec<RawJob>> {
    let doc: Value = serde_yaml::from_str(text)?;

    let entries = match doc {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        _ => {
            return Err(ConfigError::MalformedConfig(
                "expected a list of configuration entries".to_string(),
            ));
        }
    };

    let mut jobs = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Object(mut entry) = entry else {
            return Err(ConfigError::MalformedConfig(format!(
                "entry {} is not a mapping",
                index
            )));
        };
        if entry.len() != 1 {
            return Err(ConfigError::MalformedConfig(format!(
                "entry {} must have exactly one key, found {}",
                index,
                entry.len()
            )));
        }

        match entry.remove("job") {
            Some(Value::Object(job)) => jobs.push(job),
            Some(_) => {
                return Err(ConfigError::MalformedConfig(format!(
                    "job entry {} is not a mapping",
                    index
                )));
            }
            None => {
                let kind = entry.keys().next().cloned().unwrap_or_default();
                debug!(entry = index, kind = %kind, "skipping non-job entry");
            }
        }
    }

    Ok(jobs)
}

fn read_kdl(text: &str) -> ConfigResult<Vec<RawJob>> {
    let doc: KdlDocument = text.parse()?;

    let mut jobs = Vec::new();
    for node in doc.nodes() {
        match node.name().value() {
            "job" => jobs.push(kdl_job(node)?),
            other => debug!(node = other, "skipping non-job node"),
        }
    }

    Ok(jobs)
}

fn kdl_job(node: &KdlNode) -> ConfigResult<RawJob> {
    let mut job = Map::new();

    // Name is optional here so a missing one is reported by the job parser.
    if let Some(name) = first_arg(node) {
        job.insert("name".to_string(), kdl_value(name));
    }

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value();
            let value = match key {
                "required-projects" => kdl_projects(child),
                "roles" => kdl_roles(child),
                _ => kdl_node_value(child),
            };
            if job.insert(key.to_string(), value).is_some() {
                return Err(ConfigError::MalformedConfig(format!(
                    "attribute '{}' given more than once",
                    key
                )));
            }
        }
    }

    Ok(job)
}

// required-projects "a" "b" { project "c" override-checkout="stable" }
fn kdl_projects(node: &KdlNode) -> Value {
    let mut projects: Vec<Value> = args(node).map(kdl_value).collect();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let mut project = Map::new();
            if let Some(name) = first_arg(child) {
                project.insert("name".to_string(), kdl_value(name));
            }
            for (key, value) in props(child) {
                project.insert(key.to_string(), kdl_value(value));
            }
            projects.push(Value::Object(project));
        }
    }

    Value::Array(projects)
}

// roles { zuul "openstack/devstack" name="devstack"; galaxy "geerlingguy.pip" }
fn kdl_roles(node: &KdlNode) -> Value {
    let mut roles = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let mut role = Map::new();
            role.insert(
                child.name().value().to_string(),
                first_arg(child).map(kdl_value).unwrap_or(Value::Null),
            );
            for (key, value) in props(child) {
                role.insert(key.to_string(), kdl_value(value));
            }
            roles.push(Value::Object(role));
        }
    }

    Value::Array(roles)
}

/// Convert an arbitrary node into a value.
///
/// - children named `-` become a list
/// - other children become a mapping
/// - a single argument becomes a scalar, several become a list
/// - properties alone become a mapping
/// - a bare node is null
pub(crate) fn kdl_node_value(node: &KdlNode) -> Value {
    if let Some(children) = node.children() {
        let nodes = children.nodes();
        if !nodes.is_empty() && nodes.iter().all(|n| n.name().value() == "-") {
            return Value::Array(nodes.iter().map(kdl_node_value).collect());
        }
        let mut map = Map::new();
        for child in nodes {
            map.insert(child.name().value().to_string(), kdl_node_value(child));
        }
        return Value::Object(map);
    }

    let mut values: Vec<Value> = args(node).map(kdl_value).collect();
    let props: Map<String, Value> = props(node)
        .map(|(k, v)| (k.to_string(), kdl_value(v)))
        .collect();

    match (values.len(), props.is_empty()) {
        (0, true) => Value::Null,
        (0, false) => Value::Object(props),
        (1, true) => values.remove(0),
        _ if props.is_empty() => Value::Array(values),
        _ => {
            // Mixed arguments and properties: keep both.
            let mut map = props;
            map.insert("-".to_string(), Value::Array(values));
            Value::Object(map)
        }
    }
}

pub(crate) fn kdl_value(value: &KdlValue) -> Value {
    match value {
        KdlValue::String(s) => Value::String(s.clone()),
        KdlValue::Integer(i) => {
            if let Ok(i) = i64::try_from(*i) {
                Value::Number(i.into())
            } else if let Ok(u) = u64::try_from(*i) {
                Value::Number(u.into())
            } else {
                Value::String(i.to_string())
            }
        }
        KdlValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        KdlValue::Bool(b) => Value::Bool(*b),
        KdlValue::Null => Value::Null,
    }
}

fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

fn first_arg(node: &KdlNode) -> Option<&KdlValue> {
    args(node).next()
}

fn props(node: &KdlNode) -> impl Iterator<Item = (&str, &KdlValue)> {
    node.entries()
        .iter()
        .filter_map(|e| e.name().map(|n| (n.value(), e.value())))
}

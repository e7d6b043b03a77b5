//! Normalized job descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{PlaybookPath, ProjectRef, RoleBinding};

/// A job with its inheritance chain flattened and variables interpolated.
///
/// This is what gets handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The job itself followed by its ancestors, root last.
    pub inheritance: Vec<String>,
    pub required_projects: Vec<ProjectRef>,
    #[serde(with = "crate::timeout::secs")]
    pub timeout: Duration,
    pub roles: Vec<RoleBinding>,
    pub vars: BTreeMap<String, Value>,
    pub run: PlaybookPath,
    /// Post-run playbooks in execution order: the job's own first.
    pub post_run: Vec<PlaybookPath>,
}

impl JobDescriptor {
    /// Every playbook this job will run, in order.
    pub fn playbooks(&self) -> impl Iterator<Item = &PlaybookPath> {
        std::iter::once(&self.run).chain(self.post_run.iter())
    }

    /// The root of the inheritance chain.
    pub fn root(&self) -> &str {
        self.inheritance
            .last()
            .map(String::as_str)
            .unwrap_or(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playbooks_order() {
        let descriptor = JobDescriptor {
            name: "child".to_string(),
            description: None,
            inheritance: vec!["child".to_string(), "base".to_string()],
            required_projects: Vec::new(),
            timeout: Duration::from_secs(60),
            roles: Vec::new(),
            vars: BTreeMap::new(),
            run: PlaybookPath::new("run.yaml").unwrap(),
            post_run: vec![
                PlaybookPath::new("child-post.yaml").unwrap(),
                PlaybookPath::new("base-post.yaml").unwrap(),
            ],
        };

        let order: Vec<&str> = descriptor.playbooks().map(|p| p.as_str()).collect();
        assert_eq!(order, vec!["run.yaml", "child-post.yaml", "base-post.yaml"]);
        assert_eq!(descriptor.root(), "base");

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["timeout"], serde_json::json!(60));
    }
}

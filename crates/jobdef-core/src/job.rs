//! Job definitions.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;

use crate::{Error, PlaybookPath, Result};

/// A CI job as written in configuration.
///
/// Constructed once at load time and never mutated afterwards. Fields that
/// a job may inherit from its parent (`timeout`, `description`,
/// `post_run`) are optional here; see [`crate::JobDescriptor`] for the
/// flattened form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobDefinition {
    /// Job name (e.g., "rally-task-at-devstack").
    pub name: String,
    /// Name of the job this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Projects checked out alongside the change under test.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_projects: Vec<ProjectRef>,
    /// Maximum run time.
    #[serde(
        default,
        with = "crate::timeout::secs_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    /// Repositories providing roles to the playbooks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleBinding>,
    /// Variables passed to the playbooks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, Value>,
    /// Main playbook.
    pub run: PlaybookPath,
    /// Playbook run after the main playbook, regardless of its outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_run: Option<PlaybookPath>,
}

impl JobDefinition {
    /// Create a minimal job with only the required fields.
    pub fn new(name: impl Into<String>, run: PlaybookPath) -> Self {
        Self {
            name: name.into(),
            parent: None,
            description: None,
            required_projects: Vec::new(),
            timeout: None,
            roles: Vec::new(),
            vars: BTreeMap::new(),
            run,
            post_run: None,
        }
    }

    /// Check the invariants that do not depend on other jobs.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::field("name", "must not be empty"));
        }

        if self.parent.as_deref() == Some(self.name.as_str()) {
            return Err(Error::field(
                "parent",
                format!("job '{}' cannot inherit from itself", self.name),
            ));
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(Error::field("timeout", "must be positive"));
            }
        }

        let mut seen = HashSet::new();
        for project in &self.required_projects {
            if !seen.insert(project.name.as_str()) {
                return Err(Error::field(
                    "required-projects",
                    format!("project '{}' listed more than once", project.name),
                ));
            }
        }

        Ok(())
    }

    /// Whether this job has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A project checked out for a job.
///
/// Written either as a bare name or as a mapping with an
/// `override-checkout` branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    /// Canonical project name (e.g., "openstack/rally").
    pub name: String,
    /// Branch or tag to check out instead of the default.
    pub override_checkout: Option<String>,
}

impl ProjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            override_checkout: None,
        }
    }

    pub fn with_override_checkout(mut self, checkout: impl Into<String>) -> Self {
        self.override_checkout = Some(checkout.into());
        self
    }
}

impl std::str::FromStr for ProjectRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("project name is empty".to_string()));
        }
        Ok(Self::new(name))
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.override_checkout {
            Some(checkout) => write!(f, "{}@{}", self.name, checkout),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Serialize for ProjectRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.override_checkout {
            None => serializer.serialize_str(&self.name),
            Some(checkout) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("name", &self.name)?;
                map.serialize_entry("override-checkout", checkout)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ProjectRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ProjectRefVisitor;

        impl<'de> Visitor<'de> for ProjectRefVisitor {
            type Value = ProjectRef;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a project name or a mapping with a 'name' key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ProjectRef, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<ProjectRef, A::Error> {
                let mut name: Option<String> = None;
                let mut override_checkout = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "name" => name = Some(map.next_value()?),
                        "override-checkout" => override_checkout = Some(map.next_value()?),
                        other => {
                            return Err(de::Error::unknown_field(
                                other,
                                &["name", "override-checkout"],
                            ));
                        }
                    }
                }
                let name = name.ok_or_else(|| de::Error::missing_field("name"))?;
                let mut project: ProjectRef = name.parse().map_err(de::Error::custom)?;
                project.override_checkout = override_checkout;
                Ok(project)
            }
        }

        deserializer.deserialize_any(ProjectRefVisitor)
    }
}

/// Where a job's playbooks find their roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleBinding {
    /// Roles from a project known to the CI system.
    Zuul {
        #[serde(rename = "zuul")]
        project: String,
        /// Name the role is installed under, if different from the project.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Roles from Ansible Galaxy.
    Galaxy {
        #[serde(rename = "galaxy")]
        name: String,
    },
}

impl RoleBinding {
    pub fn zuul(project: impl Into<String>) -> Self {
        RoleBinding::Zuul {
            project: project.into(),
            name: None,
        }
    }

    pub fn galaxy(name: impl Into<String>) -> Self {
        RoleBinding::Galaxy { name: name.into() }
    }
}

impl fmt::Display for RoleBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleBinding::Zuul {
                project,
                name: Some(name),
            } => write!(f, "zuul:{} as {}", project, name),
            RoleBinding::Zuul { project, name: None } => write!(f, "zuul:{}", project),
            RoleBinding::Galaxy { name } => write!(f, "galaxy:{}", name),
        }
    }
}

//! Playbook paths.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::{Error, Result};

/// Path to a playbook, relative to the root of the project that defines the job.
///
/// Playbooks are interpreted by the execution engine; this type only
/// guarantees the path is non-empty, relative, and stays inside the project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(try_from = "String", into = "String")]
#[display("{_0}")]
pub struct PlaybookPath(String);

impl PlaybookPath {
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let trimmed = path.trim();

        if trimmed.is_empty() {
            return Err(Error::InvalidInput("playbook path is empty".to_string()));
        }

        for component in Path::new(trimmed).components() {
            match component {
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidInput(format!(
                        "playbook path '{}' must be relative",
                        trimmed
                    )));
                }
                Component::ParentDir => {
                    return Err(Error::InvalidInput(format!(
                        "playbook path '{}' escapes the project root",
                        trimmed
                    )));
                }
                _ => {}
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl TryFrom<String> for PlaybookPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PlaybookPath> for String {
    fn from(path: PlaybookPath) -> Self {
        path.0
    }
}

impl std::str::FromStr for PlaybookPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

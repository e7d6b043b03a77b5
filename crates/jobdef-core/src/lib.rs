//! Core domain types for CI job definitions.
//!
//! This crate contains:
//! - Job definitions as written in configuration
//! - Project references and role bindings
//! - Playbook paths and timeouts
//! - Normalized job descriptors handed to an execution engine

pub mod descriptor;
pub mod error;
pub mod job;
pub mod playbook;
pub mod timeout;

pub use descriptor::JobDescriptor;
pub use error::{Error, Result};
pub use job::{JobDefinition, ProjectRef, RoleBinding};
pub use playbook::PlaybookPath;

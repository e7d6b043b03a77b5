//! Loading and validation of CI job definitions.
//!
//! This crate handles:
//! - Reading job documents (CI-layout YAML and KDL)
//! - Parsing raw job mappings into validated definitions
//! - The registry of known jobs and parent resolution
//! - Flattening inheritance into job descriptors
//! - Variable interpolation
//! - Loader settings

pub mod document;
pub mod error;
pub mod job;
pub mod loader;
pub mod playbook;
pub mod registry;
pub mod render;
pub mod resolve;
pub mod settings;
pub mod variables;

pub use document::{Format, RawJob};
pub use error::{ConfigError, ConfigResult};
pub use job::{ParseOptions, parse_job};
pub use loader::Loader;
pub use registry::{JobRegistry, KnownJobs};
pub use settings::LoaderSettings;
pub use variables::{JobContext, VariableContext, VariableContextBuilder};

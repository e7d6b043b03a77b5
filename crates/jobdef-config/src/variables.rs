//! Variable interpolation for job definitions.
//!
//! Supports variables like:
//! - `${job.name}` - Name of the job being resolved
//! - `${job.parent}` - Name of its parent (empty for root jobs)
//! - `${env.VAR_NAME}` - Environment variable
//! - `${timestamp}` - Unix timestamp
//! - `${date}` - ISO date (YYYY-MM-DD)
//! - `${datetime}` - ISO datetime
//! - `${var_name}` - A scalar entry of the job's own `vars`
//!
//! Interpolation is a single pass: substituted text is never expanded
//! again. Unknown variables are left as written.

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Variable context containing all available variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Job-related variables
    pub job: JobContext,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Job vars and other user-defined values
    pub custom: HashMap<String, String>,
}

/// Job context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct JobContext {
    pub name: String,
    pub parent: Option<String>,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)?)\}")
        .expect("variable pattern is valid")
});

/// Whether a string contains any `${...}` reference.
pub fn has_variables(input: &str) -> bool {
    VAR_REGEX.is_match(input)
}

impl VariableContext {
    /// Create a new empty variable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate environment variables from the current process environment.
    pub fn populate_env(&mut self) {
        for (key, value) in std::env::vars() {
            self.env.insert(key, value);
        }
    }

    /// Add a custom variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.custom.insert(name.to_string(), value.into());
    }

    /// Derive the context for one job: its name, parent, and scalar vars.
    pub fn for_job(
        &self,
        name: &str,
        parent: Option<&str>,
        vars: &BTreeMap<String, Value>,
    ) -> VariableContext {
        let mut ctx = self.clone();
        ctx.job = JobContext {
            name: name.to_string(),
            parent: parent.map(str::to_string),
        };
        for (key, value) in vars {
            let scalar = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            ctx.custom.insert(key.clone(), scalar);
        }
        ctx
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["job", "name"] => Some(self.job.name.clone()),
            ["job", "parent"] => Some(self.job.parent.clone().unwrap_or_default()),

            ["env", name] => self.env.get(*name).cloned(),

            ["timestamp"] => Some(chrono::Utc::now().timestamp().to_string()),
            ["date"] => Some(chrono::Utc::now().format("%Y-%m-%d").to_string()),
            ["datetime"] => Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),

            // Single-part names check custom variables
            [name] => self.custom.get(*name).cloned(),

            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    /// Variables are specified as `${var_name}` or `${namespace.var_name}`.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Interpolate every string inside a value, keeping its shape.
    pub fn interpolate_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.interpolate(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.interpolate_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.interpolate_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Interpolate variables in a map of values.
    pub fn interpolate_map(&self, map: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        map.iter()
            .map(|(k, v)| (k.clone(), self.interpolate_value(v)))
            .collect()
    }

    /// Names of the variables in a string that this context cannot resolve.
    pub fn unresolved(&self, input: &str) -> Vec<String> {
        VAR_REGEX
            .captures_iter(input)
            .map(|caps| caps[1].to_string())
            .filter(|name| self.resolve(name).is_none())
            .collect()
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_job(mut self, name: impl Into<String>, parent: Option<String>) -> Self {
        self.ctx.job.name = name.into();
        self.ctx.job.parent = parent;
        self
    }

    pub fn with_process_env(mut self) -> Self {
        self.ctx.populate_env();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.custom.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_variables() {
        let ctx = VariableContextBuilder::new()
            .with_job("rally-task-at-devstack", Some("devstack".to_string()))
            .build();

        let result = ctx.interpolate("${job.name} extends ${job.parent}");
        assert_eq!(result, "rally-task-at-devstack extends devstack");
    }

    #[test]
    fn test_env_variables() {
        let ctx = VariableContextBuilder::new()
            .with_env("ZUUL_BRANCH", "master")
            .with_env("ANOTHER", "world")
            .build();

        let result = ctx.interpolate("${env.ZUUL_BRANCH} ${env.ANOTHER}!");
        assert_eq!(result, "master world!");
    }

    #[test]
    fn test_unknown_variable_preserved() {
        let ctx = VariableContext::new();
        let result = ctx.interpolate("Unknown: ${unknown.var} and ${missing}");
        assert_eq!(result, "Unknown: ${unknown.var} and ${missing}");
        assert_eq!(ctx.unresolved("${unknown.var} ${date}"), vec!["unknown.var"]);
    }

    #[test]
    fn test_for_job_exposes_scalar_vars() {
        let mut vars = BTreeMap::new();
        vars.insert("rally_task".to_string(), json!("rally-jobs/task.yaml"));
        vars.insert("concurrency".to_string(), json!(4));
        vars.insert("debug".to_string(), json!(true));
        vars.insert("plugins".to_string(), json!({"a": "b"}));

        let ctx = VariableContext::new().for_job("rally", None, &vars);
        assert_eq!(
            ctx.interpolate("${rally_task} x${concurrency} debug=${debug} ${plugins}"),
            "rally-jobs/task.yaml x4 debug=true ${plugins}"
        );
        assert_eq!(ctx.interpolate("${job.parent}"), "");
    }

    #[test]
    fn test_single_pass() {
        let ctx = VariableContextBuilder::new()
            .with_custom("a", "${b}")
            .with_custom("b", "${a}")
            .build();
        assert_eq!(ctx.interpolate("${a}"), "${b}");
    }

    #[test]
    fn test_interpolate_value_keeps_shape() {
        let ctx = VariableContextBuilder::new()
            .with_custom("task", "boot.yaml")
            .build();

        let value = json!({
            "args": ["--task", "${task}"],
            "count": 3,
            "nested": {"file": "tasks/${task}"}
        });
        assert_eq!(
            ctx.interpolate_value(&value),
            json!({
                "args": ["--task", "boot.yaml"],
                "count": 3,
                "nested": {"file": "tasks/boot.yaml"}
            })
        );
    }

    #[test]
    fn test_timestamp_variables() {
        let ctx = VariableContext::new();

        let result = ctx.interpolate("${date}");
        // Should be in YYYY-MM-DD format
        assert!(result.len() == 10);
        assert!(result.contains('-'));
    }

    #[test]
    fn test_nested_braces() {
        let ctx = VariableContextBuilder::new()
            .with_custom("sha", "abc123")
            .build();

        let result = ctx.interpolate(r#"{"sha": "${sha}"}"#);
        assert_eq!(result, r#"{"sha": "abc123"}"#);
    }

    #[test]
    fn test_has_variables() {
        assert!(has_variables("playbooks/${job.name}/run.yaml"));
        assert!(!has_variables("playbooks/run.yaml"));
        assert!(!has_variables("playbooks/${}/run.yaml"));
    }
}

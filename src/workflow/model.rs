//! Workflow Data Model
//!
//! Core data structures representing processing modules and the ordered
//! workflows that bind them together.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: number-pipeline
//! steps:
//!   - position: 1
//!     module:
//!       name: generate
//!       executable: ./generate.sh
//!       needs_input: false
//!
//!   - position: 2
//!     module:
//!       name: summarize
//!       executable: ./summarize.sh
//!     input: "5\n"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A reusable unit of work backed by one external executable.
///
/// Modules are immutable during a run; only the (out-of-scope) editor
/// mutates them between runs.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Module {
    /// Unique identifier (assigned by the definition loader or the caller)
    #[serde(default)]
    pub id: i64,

    /// Human-readable module name
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Label describing the input this module consumes
    #[serde(default)]
    pub input_type: String,

    /// Label describing the output this module produces
    #[serde(default)]
    pub output_type: String,

    /// Path to the module's executable. Empty means not configured;
    /// such a module is skipped at execution time.
    #[serde(default)]
    pub executable: String,

    /// Whether the module reads a textual payload from stdin
    #[serde(default = "default_true")]
    pub needs_input: bool,

    /// Whether the module is expected to produce output for later steps
    #[serde(default = "default_true")]
    pub needs_output: bool,
}

fn default_true() -> bool {
    true
}

impl Module {
    /// Creates a new module with the given name.
    ///
    /// # Example
    ///
    /// ```
    /// use modflow::workflow::Module;
    ///
    /// let module = Module::new("summarize")
    ///     .with_executable("/opt/modules/summarize")
    ///     .with_description("Aggregates incoming records");
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
            description: String::new(),
            input_type: String::new(),
            output_type: String::new(),
            executable: String::new(),
            needs_input: true,
            needs_output: true,
        }
    }

    /// Sets the executable path.
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into().trim().to_string();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the declared input/output type labels.
    pub fn with_io_types(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_type = input.into();
        self.output_type = output.into();
        self
    }

    /// Sets whether the module reads a payload from stdin.
    pub fn reads_input(mut self, needs_input: bool) -> Self {
        self.needs_input = needs_input;
        self
    }

    /// Sets whether the module produces output for later steps.
    pub fn writes_output(mut self, needs_output: bool) -> Self {
        self.needs_output = needs_output;
        self
    }

    /// Returns true if an executable path is configured.
    pub fn has_executable(&self) -> bool {
        !self.executable.trim().is_empty()
    }
}

/// A positioned binding of a module into a workflow.
///
/// The `position` is 1-based and defines execution order. Input/output
/// linkage to neighboring steps is positional, not explicit.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkflowStep {
    /// Unique identifier (assigned by the definition loader or the caller)
    #[serde(default)]
    pub id: i64,

    /// The module this step executes (resolved before execution)
    pub module: Module,

    /// 1-based position within the workflow; defines execution order
    pub position: u32,

    /// Free-form step parameters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, Value>,

    /// Optional textual payload piped to the module's stdin when the
    /// module declares `needs_input`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Optional reference to the input artifact, recorded on the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_ref: Option<String>,
}

impl WorkflowStep {
    /// Creates a step binding `module` at `position`.
    pub fn new(module: Module, position: u32) -> Self {
        Self {
            id: 0,
            module,
            position,
            parameters: HashMap::new(),
            input: None,
            input_ref: None,
        }
    }

    /// Sets the inline input payload.
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Sets the input artifact reference.
    pub fn with_input_ref(mut self, input_ref: impl Into<String>) -> Self {
        self.input_ref = Some(input_ref.into());
        self
    }

    /// Sets a free-form parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// A named ordered collection of steps.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Workflow {
    /// Unique identifier (assigned by the definition loader or the caller)
    #[serde(default)]
    pub id: i64,

    /// Workflow name (unique among workflows)
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Steps in this workflow
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    /// Creates a new empty workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into().trim().to_string(),
            description: String::new(),
            created_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    /// Adds a step to the workflow.
    ///
    /// Rejects a step whose position is already taken.
    pub fn add_step(&mut self, step: WorkflowStep) -> Result<(), String> {
        if self.steps.iter().any(|s| s.position == step.position) {
            return Err(format!(
                "Workflow '{}' already has a step at position {}",
                self.name, step.position
            ));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Gets a step by position.
    pub fn step_at(&self, position: u32) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.position == position)
    }

    /// Returns the steps sorted by ascending position (execution order).
    pub fn ordered_steps(&self) -> Vec<WorkflowStep> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.position);
        steps
    }

    /// Sorts the steps in place by ascending position.
    pub fn sort_steps(&mut self) {
        self.steps.sort_by_key(|s| s.position);
    }

    /// Returns the number of steps in the workflow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_creation() {
        let module = Module::new("  summarize  ")
            .with_executable("/opt/modules/summarize")
            .with_io_types("records", "report")
            .reads_input(false);

        assert_eq!(module.name, "summarize");
        assert_eq!(module.executable, "/opt/modules/summarize");
        assert_eq!(module.input_type, "records");
        assert_eq!(module.output_type, "report");
        assert!(!module.needs_input);
        assert!(module.needs_output);
    }

    #[test]
    fn test_module_has_executable() {
        let configured = Module::new("a").with_executable("/bin/true");
        let unconfigured = Module::new("b");
        let blank = Module::new("c").with_executable("   ");

        assert!(configured.has_executable());
        assert!(!unconfigured.has_executable());
        assert!(!blank.has_executable());
    }

    #[test]
    fn test_step_builders() {
        let step = WorkflowStep::new(Module::new("gen"), 1)
            .with_input("5\n")
            .with_input_ref("seed.txt")
            .with_parameter("retries", serde_json::json!(0));

        assert_eq!(step.position, 1);
        assert_eq!(step.input.as_deref(), Some("5\n"));
        assert_eq!(step.input_ref.as_deref(), Some("seed.txt"));
        assert_eq!(step.parameters["retries"], serde_json::json!(0));
    }

    #[test]
    fn test_workflow_add_step() {
        let mut workflow = Workflow::new("demo");
        assert!(workflow
            .add_step(WorkflowStep::new(Module::new("a"), 1))
            .is_ok());
        assert!(workflow
            .add_step(WorkflowStep::new(Module::new("b"), 1))
            .is_err()); // Position taken
        assert_eq!(workflow.len(), 1);
    }

    #[test]
    fn test_workflow_ordered_steps() {
        let mut workflow = Workflow::new("demo");
        workflow
            .add_step(WorkflowStep::new(Module::new("third"), 3))
            .unwrap();
        workflow
            .add_step(WorkflowStep::new(Module::new("first"), 1))
            .unwrap();
        workflow
            .add_step(WorkflowStep::new(Module::new("second"), 2))
            .unwrap();

        let ordered = workflow.ordered_steps();
        let names: Vec<&str> = ordered.iter().map(|s| s.module.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_workflow_step_at() {
        let mut workflow = Workflow::new("demo");
        workflow
            .add_step(WorkflowStep::new(Module::new("a"), 1))
            .unwrap();

        assert!(workflow.step_at(1).is_some());
        assert!(workflow.step_at(2).is_none());
    }

    #[test]
    fn test_workflow_is_empty() {
        let workflow = Workflow::new("demo");
        assert!(workflow.is_empty());
        assert_eq!(workflow.len(), 0);
    }

    #[test]
    fn test_module_yaml_defaults() {
        let module: Module = serde_yaml::from_str("name: plain").unwrap();

        assert_eq!(module.name, "plain");
        assert!(module.executable.is_empty());
        assert!(module.needs_input);
        assert!(module.needs_output);
    }

    #[test]
    fn test_step_yaml_roundtrip() {
        let yaml = r#"
position: 2
module:
  name: summarize
  executable: ./summarize.sh
  needs_input: true
input: "5\n"
"#;
        let step: WorkflowStep = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(step.position, 2);
        assert_eq!(step.module.name, "summarize");
        assert_eq!(step.input.as_deref(), Some("5\n"));
        assert!(step.input_ref.is_none());
    }
}

//! Workflow Definition Parser
//!
//! Loads workflow definitions from YAML files. The editor that normally
//! produces workflows is an external collaborator; a definition file is
//! the engine's caller-facing way to receive a named, ordered step list.

use std::fs;
use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use super::model::Workflow;
use super::validator::validate_workflow;

/// Errors raised while loading a workflow definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definition file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse definition YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid workflow definition:\n{0}")]
    Invalid(String),
}

/// Loads a workflow definition from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Assigns identifiers to the workflow, its steps, and their modules
/// 3. Validates the structure and normalizes step order
///
/// # Example
///
/// ```rust,no_run
/// use modflow::workflow::load_definition;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_definition("pipeline.yaml")?;
///     println!("Loaded {} steps", workflow.len());
///     Ok(())
/// }
/// ```
pub fn load_definition(path: impl AsRef<Path>) -> Result<Workflow, DefinitionError> {
    let path = path.as_ref();
    info!("Loading workflow definition from {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut workflow: Workflow = serde_yaml::from_str(&yaml_content)?;

    assign_ids(&mut workflow);
    validate_workflow(&mut workflow).map_err(DefinitionError::Invalid)?;

    info!(
        "Workflow '{}' loaded: {} steps",
        workflow.name,
        workflow.len()
    );
    Ok(workflow)
}

/// Fills in identifiers the definition file left unset.
///
/// The workflow id is derived from its (unique) name so that repeated
/// invocations against the same store find the same instance history.
/// Steps and modules get sequential ids in file order.
fn assign_ids(workflow: &mut Workflow) {
    if workflow.id == 0 {
        workflow.id = stable_workflow_id(&workflow.name);
        debug!(
            "Assigned workflow id {} from name '{}'",
            workflow.id, workflow.name
        );
    }

    for (index, step) in workflow.steps.iter_mut().enumerate() {
        if step.id == 0 {
            step.id = index as i64 + 1;
        }
        if step.module.id == 0 {
            step.module.id = index as i64 + 1;
        }
    }
}

/// FNV-1a over the workflow name, folded to the positive i64 range.
fn stable_workflow_id(name: &str) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash & 0x7fff_ffff_ffff_ffff) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const DEFINITION: &str = r#"
name: number-pipeline
description: generates and summarizes numbers
steps:
  - position: 2
    module:
      name: summarize
      executable: ./summarize.sh
    input: "5\n"
  - position: 1
    module:
      name: generate
      executable: ./generate.sh
      needs_input: false
"#;

    fn write_definition(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflow.yaml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_definition() {
        let (_dir, path) = write_definition(DEFINITION);
        let workflow = load_definition(&path).unwrap();

        assert_eq!(workflow.name, "number-pipeline");
        assert_eq!(workflow.len(), 2);

        // Sorted into execution order
        assert_eq!(workflow.steps[0].module.name, "generate");
        assert_eq!(workflow.steps[1].module.name, "summarize");
        assert_eq!(workflow.steps[1].input.as_deref(), Some("5\n"));
    }

    #[test]
    fn test_ids_assigned() {
        let (_dir, path) = write_definition(DEFINITION);
        let workflow = load_definition(&path).unwrap();

        assert_ne!(workflow.id, 0);
        assert!(workflow.steps.iter().all(|s| s.id != 0));
        assert!(workflow.steps.iter().all(|s| s.module.id != 0));
    }

    #[test]
    fn test_workflow_id_stable_across_loads() {
        let (_dir, path) = write_definition(DEFINITION);
        let first = load_definition(&path).unwrap();
        let second = load_definition(&path).unwrap();

        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_distinct_names_get_distinct_ids() {
        assert_ne!(
            stable_workflow_id("number-pipeline"),
            stable_workflow_id("other-pipeline")
        );
    }

    #[test]
    fn test_missing_file() {
        let result = load_definition("/nonexistent/workflow.yaml");
        assert!(matches!(result, Err(DefinitionError::Read { .. })));
    }

    #[test]
    fn test_malformed_yaml() {
        let (_dir, path) = write_definition("name: [unclosed");
        let result = load_definition(&path);
        assert!(matches!(result, Err(DefinitionError::Parse(_))));
    }

    #[test]
    fn test_invalid_definition() {
        let (_dir, path) = write_definition("name: empty-flow\nsteps: []");
        let result = load_definition(&path);
        assert!(matches!(result, Err(DefinitionError::Invalid(_))));
    }

    #[test]
    fn test_explicit_ids_preserved() {
        let yaml = r#"
name: explicit
id: 42
steps:
  - position: 1
    module:
      name: only
      executable: ./only.sh
"#;
        let (_dir, path) = write_definition(yaml);
        let workflow = load_definition(&path).unwrap();
        assert_eq!(workflow.id, 42);
    }
}

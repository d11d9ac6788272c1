//! Workflow Validation
//!
//! Structural checks for workflow definitions before execution:
//! - Workflow and module field validation
//! - Position ordering (1-based, contiguous)
//! - Repair of merely-unsorted or gapped positions

use std::collections::HashSet;

use log::{debug, warn};

use super::model::Workflow;

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone)]
pub enum ValidationError {
    EmptyWorkflowName,
    EmptyWorkflow,
    ZeroPosition(String),
    DuplicatePosition(u32),
    EmptyModuleName(u32),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWorkflowName => write!(f, "Workflow has no name"),
            Self::EmptyWorkflow => write!(f, "Workflow has no steps"),
            Self::ZeroPosition(module) => {
                write!(f, "Step '{}' has position 0 (positions are 1-based)", module)
            }
            Self::DuplicatePosition(position) => {
                write!(f, "Duplicate step position: {}", position)
            }
            Self::EmptyModuleName(position) => {
                write!(f, "Step at position {} has a module with no name", position)
            }
        }
    }
}

/// Validates the workflow structure and normalizes step order.
///
/// Performs the following checks:
/// 1. Workflow has a name and at least one step
/// 2. No duplicate or zero positions
/// 3. Every step's module has a name
///
/// On success the steps are sorted by position; gapped position runs
/// (e.g. 1, 3, 5) are renumbered to be contiguous with a warning.
pub fn validate_workflow(workflow: &mut Workflow) -> Result<(), String> {
    debug!("Validating workflow '{}'", workflow.name);

    let mut errors: Vec<ValidationError> = Vec::new();

    if workflow.name.trim().is_empty() {
        errors.push(ValidationError::EmptyWorkflowName);
    }

    if workflow.steps.is_empty() {
        errors.push(ValidationError::EmptyWorkflow);
    }

    let mut seen_positions: HashSet<u32> = HashSet::new();
    for step in &workflow.steps {
        if step.position == 0 {
            errors.push(ValidationError::ZeroPosition(step.module.name.clone()));
        } else if !seen_positions.insert(step.position) {
            errors.push(ValidationError::DuplicatePosition(step.position));
        }

        if step.module.name.trim().is_empty() {
            errors.push(ValidationError::EmptyModuleName(step.position));
        }

        if !step.module.has_executable() {
            warn!(
                "Module '{}' has no executable configured; its step will be skipped",
                step.module.name
            );
        }

        if step.module.needs_input && step.input.is_none() && step.input_ref.is_none() {
            debug!(
                "Module '{}' declares needs_input but its step carries no payload",
                step.module.name
            );
        }
    }

    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(messages.join("\n"));
    }

    workflow.sort_steps();
    renumber_gapped_positions(workflow);

    debug!(
        "Workflow '{}' validated: {} steps",
        workflow.name,
        workflow.steps.len()
    );
    Ok(())
}

/// Renumbers sorted positions to 1..=n when gaps are present.
fn renumber_gapped_positions(workflow: &mut Workflow) {
    let gapped = workflow
        .steps
        .iter()
        .enumerate()
        .any(|(index, step)| step.position != index as u32 + 1);

    if !gapped {
        return;
    }

    warn!(
        "Workflow '{}' has gapped step positions; renumbering to 1..={}",
        workflow.name,
        workflow.steps.len()
    );

    for (index, step) in workflow.steps.iter_mut().enumerate() {
        step.position = index as u32 + 1;
    }
}

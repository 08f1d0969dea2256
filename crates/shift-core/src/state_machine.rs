//! Legal status transitions for flows and steps

use crate::types::{FlowStatus, StepStatus};

/// Rejected status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition")]
pub struct IllegalTransition;

/// Validates a flow status transition.
///
/// # Errors
/// Returns [`IllegalTransition`] for any move not listed by
/// [`allowed_flow_transitions`].
pub fn validate_flow_transition(from: FlowStatus, to: FlowStatus) -> Result<(), IllegalTransition> {
    if allowed_flow_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition)
    }
}

/// Flow moves one phase forward at a time; `Failed` absorbs from anywhere
/// non-terminal.
#[must_use]
pub fn allowed_flow_transitions(from: FlowStatus) -> Vec<FlowStatus> {
    use FlowStatus::*;
    match from {
        Initializing => vec![Cloning, Failed],
        Cloning => vec![Converting, Failed],
        Converting => vec![Configuring, Failed],
        Configuring => vec![Testing, Failed],
        Testing => vec![Deploying, Failed],
        Deploying => vec![Completed, Failed],
        Completed => vec![],
        Failed => vec![],
    }
}

/// Validates a step status transition.
///
/// # Errors
/// Returns [`IllegalTransition`] for any move not listed by
/// [`allowed_step_transitions`].
pub fn validate_step_transition(from: StepStatus, to: StepStatus) -> Result<(), IllegalTransition> {
    if allowed_step_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition)
    }
}

#[must_use]
pub fn allowed_step_transitions(from: StepStatus) -> Vec<StepStatus> {
    use StepStatus::*;
    match from {
        Pending => vec![InProgress],
        InProgress => vec![Completed, Error],
        Completed => vec![],
        Error => vec![],
    }
}

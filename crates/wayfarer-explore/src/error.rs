//! Error and warning types for exploration operations.

use std::fmt;

use thiserror::Error;

use wayfarer_core::requirement::Requirement;
use wayfarer_core::types::{Decision, Transition};
use wayfarer_graph::GraphError;
use wayfarer_script::CommandError;

/// Errors from exploration step operations.
#[derive(Debug, Clone, Error)]
pub enum ExploreError {
    #[error("cannot start an exploration that already has decisions in it")]
    AlreadyStarted,

    #[error("the exploration has no steps yet")]
    NoSteps,

    #[error("there is no step {0}")]
    MissingStep(usize),

    #[error("there is no position at step {0}")]
    NoPosition(usize),

    #[error("a toggle effect has an empty powers list")]
    EmptyToggle,

    #[error("a deactivate effect needs a transition to apply to")]
    DeactivateOutsideTransition,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// A non-fatal warning: a traversal was attempted whose requirement the
/// game state does not satisfy. The step is still taken — this models
/// the player trying anyway, not the world stopping them.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBlocked {
    /// Index the new step will occupy.
    pub step: usize,
    pub decision: Decision,
    pub transition: Transition,
    pub requirement: Requirement,
}

impl fmt::Display for TransitionBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requirements for transition '{}' from decision '{}' are not met at step {}: {}",
            self.transition, self.decision, self.step, self.requirement
        )
    }
}

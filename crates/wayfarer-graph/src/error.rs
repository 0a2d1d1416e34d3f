//! Error types for decision-graph operations.
//!
//! All of these are programming-contract violations, not expected
//! runtime conditions. Operations validate before mutating wherever
//! feasible, so a returned error means the graph was left unchanged.

use thiserror::Error;

use wayfarer_core::types::{Decision, Transition, Zone};

/// Errors from graph construction and surgery.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("decision '{0}' does not exist")]
    MissingDecision(Decision),

    #[error("transition '{transition}' does not exist at decision '{decision}'")]
    MissingTransition {
        decision: Decision,
        transition: Transition,
    },

    #[error("zone '{0}' does not exist")]
    MissingZone(Zone),

    #[error("decision '{0}' already exists")]
    DecisionCollision(Decision),

    #[error("transition '{transition}' is already in use at decision '{decision}'")]
    TransitionCollision {
        decision: Decision,
        transition: Transition,
    },

    #[error("zone '{0}' already exists")]
    ZoneCollision(Zone),

    #[error("invalid zone level: {0}")]
    InvalidLevel(String),

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("{0}")]
    UnknownDestination(String),
}

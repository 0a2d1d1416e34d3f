//! One step in an exploration's history.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use wayfarer_core::state::GameState;
use wayfarer_core::types::{Annotation, Decision, Tag, Transition};
use wayfarer_graph::DecisionGraph;

/// The label recorded for the transition into the first step.
pub const START_TRANSITION: &str = "_START_";

/// A snapshot of the exploration at one moment: the graph as known so
/// far, the current position and game state, and how the explorer got
/// here. Steps are immutable once appended — every mutating operation
/// clones the latest step's graph and state and appends a new step —
/// except for their tags and annotations, which are commentary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// World knowledge at this step.
    pub graph: DecisionGraph,
    /// Where the explorer is, if anywhere.
    pub position: Option<Decision>,
    /// Game state at this step.
    pub state: GameState,
    /// Label of the transition taken to arrive at this step:
    /// [`START_TRANSITION`] for the first step, a transition name or a
    /// `~~`/`..` warp label afterwards. `None` only for steps seeded
    /// directly from a graph.
    pub transition: Option<Transition>,
    /// Tags on this step.
    pub tags: BTreeSet<Tag>,
    /// Annotations on this step.
    pub annotations: Vec<Annotation>,
}

impl Step {
    /// A step with the given graph, position, state, and arrival label,
    /// and fresh tag/annotation containers.
    pub fn new(
        graph: DecisionGraph,
        position: Option<Decision>,
        state: GameState,
        transition: Option<Transition>,
    ) -> Self {
        Self {
            graph,
            position,
            state,
            transition,
            tags: BTreeSet::new(),
            annotations: Vec::new(),
        }
    }
}

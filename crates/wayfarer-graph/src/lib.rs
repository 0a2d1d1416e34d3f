//! The decision graph: a directed multigraph of named decisions and
//! transitions, with reciprocal-edge bookkeeping, unknown-destination
//! placeholders, and a zone hierarchy.
//!
//! A [`DecisionGraph`] is one snapshot of world knowledge. Decisions are
//! places where choices are made; transitions are the named choices
//! (self-edges are actions). Transitions to territory the player has
//! seen but not visited point at placeholder decisions tagged
//! `unknown`, which later get resolved onto real decisions via
//! [`DecisionGraph::replace_unexplored`]. Zones group decisions into a
//! leveled containment DAG.

pub mod error;
pub mod graph;
pub mod name;
pub mod properties;
pub mod zone;

pub use error::GraphError;
pub use graph::{
    DecisionGraph, DecisionNode, EdgeOptions, RemovedTransition, RenameMap, RenameMaps,
    ReplaceOptions, TransitionData, ZonePlacement, ENDING_TAG, UNKNOWN_TAG,
};
pub use name::unique_name;
pub use properties::{merge_properties, TransitionProperties};
pub use zone::ZoneInfo;

//! Name aliases for the core identity types.
//!
//! Decisions, transitions, powers, tokens, tags, annotations, and zones
//! are all identified by their names. Transition names must be unique
//! among the outgoing edges of a single decision, but not globally.

/// A decision point in the world — a place where a choice can be made.
pub type Decision = String;

/// A named directed edge between two decisions. Self-edges are actions.
pub type Transition = String;

/// A capability the player can hold (usually permanent).
pub type Power = String;

/// A countable consumable resource type.
pub type Token = String;

/// An arbitrary category marker on a decision, transition, or step.
pub type Tag = String;

/// A free-text note on a decision, transition, or step.
pub type Annotation = String;

/// A named hierarchical grouping of decisions and lower-level zones.
pub type Zone = String;

//! Core types for wayfarer exploration maps.
//!
//! This crate is the leaf of the workspace: it defines the name aliases
//! shared by every other crate, the [`GameState`] tracked during an
//! exploration, the [`Requirement`] boolean algebra with its text
//! mini-language, transition effects and their merge rules, and the data
//! model for the edit-command mini-language (parsing only — execution
//! lives in `wayfarer-script`).

pub mod command;
pub mod effect;
pub mod error;
pub mod requirement;
pub mod state;
pub mod types;

pub use command::{parse_command_list, Command};
pub use effect::{merge_effects, Boon, EffectKind, TransitionEffect};
pub use error::{CommandBuildError, CommandParseError, RequirementError};
pub use requirement::{has_power_or_equivalent, Equivalences, Requirement};
pub use state::GameState;
pub use types::{Annotation, Decision, Power, Tag, Token, Transition, Zone};

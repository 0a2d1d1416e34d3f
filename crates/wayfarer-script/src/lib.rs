//! Interpreter for the wayfarer edit-command mini-language.
//!
//! `wayfarer-core` defines the [`Command`] data model and parser; this
//! crate executes command lists against a mutable [`Scope`] of dynamic
//! [`Value`]s. Graph and exploration method calls go through the
//! [`CallHost`] trait so that the interpreter itself stays independent of
//! the graph crates — `wayfarer-explore` provides the real host.
//!
//! [`Command`]: wayfarer_core::Command

pub mod error;
pub mod interp;
pub mod scope;
pub mod value;

pub use error::{CommandError, Fault};
pub use interp::{run_command, run_command_block, CallHost, CommandOutcome, NoHost, SkipTo};
pub use scope::{Scope, CURRENT, PREVIOUS};
pub use value::Value;

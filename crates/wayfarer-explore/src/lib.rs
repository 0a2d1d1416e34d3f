//! Append-only exploration history over decision graphs.
//!
//! An [`Exploration`] is a sequence of immutable [`Step`]s: each holds
//! its own copy of the decision graph and game state, plus the position
//! and the transition that led there. Step-producing operations
//! (`start`, `explore`, `return_to`, `retrace`, `take_action`, `warp`)
//! always clone the latest graph and state before mutating, so earlier
//! steps never change. `observe` and `re_zone` augment the current step
//! in place.
//!
//! This crate also hosts the dispatch table that lets edit-command
//! scripts call graph and exploration methods by name, and the
//! integrity-checked [`JourneyFile`] save format.

pub mod dispatch;
pub mod error;
pub mod exploration;
pub mod serialize;
pub mod step;

pub use dispatch::{dispatch_exploration, dispatch_graph};
pub use error::{ExploreError, TransitionBlocked};
pub use exploration::{Exploration, ObserveEntry, ReZoneTarget};
pub use serialize::{JourneyError, JourneyFile, JourneyVersion};
pub use step::{Step, START_TRANSITION};

//! Error types for the core mini-languages.

use thiserror::Error;

/// Errors from parsing or transforming [`Requirement`]s.
///
/// [`Requirement`]: crate::requirement::Requirement
#[derive(Debug, Clone, Error)]
pub enum RequirementError {
    #[error("could not parse requirement: {detail}")]
    Syntax { detail: String },

    #[error("cannot convert requirement '{requirement}' into a gain list")]
    NoGainList { requirement: String },
}

/// Errors from assembling a single command out of its name and arguments.
#[derive(Debug, Clone, Error)]
pub enum CommandBuildError {
    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("command '{command}' requires {requires} argument(s) but {given} were provided")]
    WrongArity {
        command: String,
        requires: usize,
        given: usize,
    },

    #[error("the {arg_desc} argument to '{command}' is invalid: {detail}")]
    BadArgument {
        command: String,
        arg_desc: String,
        detail: String,
    },
}

/// Errors from parsing a command-list text block.
#[derive(Debug, Clone, Error)]
pub enum CommandParseError {
    #[error("unterminated quote starting on line {line} at column {column}")]
    UnterminatedQuote { line: usize, column: usize },

    #[error("line {line}: {source}")]
    BadCommand {
        line: usize,
        #[source]
        source: CommandBuildError,
    },
}

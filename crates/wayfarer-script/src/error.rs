//! Typed command-execution errors.
//!
//! Failures inside a command are classified into one of five fault
//! categories; the interpreter wraps each fault with the offending
//! command and its line number before propagating. Propagation is
//! immediate — there is no partial-command recovery.

use thiserror::Error;

use wayfarer_core::Command;

/// A classified failure, before command/line context is attached.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    Key(String),
    #[error("{0}")]
    Other(String),
}

/// A command-execution error: one variant per fault category, each
/// carrying the offending command and its 1-based line number.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("line {line}, running {command}: value error: {message}")]
    Value {
        command: String,
        line: usize,
        message: String,
    },

    #[error("line {line}, running {command}: type error: {message}")]
    Type {
        command: String,
        line: usize,
        message: String,
    },

    #[error("line {line}, running {command}: index error: {message}")]
    Index {
        command: String,
        line: usize,
        message: String,
    },

    #[error("line {line}, running {command}: key error: {message}")]
    Key {
        command: String,
        line: usize,
        message: String,
    },

    #[error("line {line}, running {command}: {message}")]
    Other {
        command: String,
        line: usize,
        message: String,
    },
}

impl CommandError {
    /// Attach command and line context to a fault.
    pub fn from_fault(fault: Fault, command: &Command, line: usize) -> Self {
        let command = format!("{command:?}");
        match fault {
            Fault::Value(message) => CommandError::Value {
                command,
                line,
                message,
            },
            Fault::Type(message) => CommandError::Type {
                command,
                line,
                message,
            },
            Fault::Index(message) => CommandError::Index {
                command,
                line,
                message,
            },
            Fault::Key(message) => CommandError::Key {
                command,
                line,
                message,
            },
            Fault::Other(message) => CommandError::Other {
                command,
                line,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_context() {
        let command = Command::Val { value: "5".into() };
        let err = CommandError::from_fault(Fault::Type("bad".into()), &command, 3);
        let text = err.to_string();
        assert!(text.contains("line 3"));
        assert!(text.contains("type error"));
        assert!(text.contains("bad"));
    }
}

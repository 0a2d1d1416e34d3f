//! The edit-command mini-language: data model and parser.
//!
//! Commands form a tiny line-oriented language for scripting graph and
//! exploration edits. Every command is a fixed-arity tuple of raw
//! strings; values and variable references (`$name`) are resolved at run
//! time by the interpreter in `wayfarer-script`. The language keeps a
//! single "current value" in the `_` variable (previous current value in
//! `__`), and most commands read or replace it.

use serde::{Deserialize, Serialize};

use crate::error::{CommandBuildError, CommandParseError};

/// The supported binary operators for the `op` command.
pub const BINARY_OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "//", "**", "%", "^", "|", "&", "and", "or", "<", ">", "<=", ">=", "==",
    "is",
];

/// The supported unary operators for the `unary` command.
pub const UNARY_OPERATORS: &[&str] = &["-", "~", "not"];

/// The call targets for the `call` command.
pub const CALL_TARGETS: &[&str] = &["builtin", "stored", "graph", "exploration"];

/// The collection kinds for the `empty` command.
pub const COLLECTION_KINDS: &[&str] = &["list", "tuple", "set", "dict"];

/// One command in the mini-language.
///
/// All payloads are raw strings: either literal values (`None`, `True`,
/// `False`, numbers, quoted strings), variable references starting with
/// `$`, or fixed keywords (operator names, collection kinds, call
/// targets) which may themselves be given as variable references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Replace the current value with a literal.
    Val { value: String },
    /// Replace the current value with an empty collection.
    Empty { collection: String },
    /// Append/add a value to the current list, tuple, or set.
    Append { value: String },
    /// Set an index/key/member in the current collection.
    Set { location: String, value: String },
    /// Pop the last element of the current list or tuple, making it the
    /// new current value.
    Pop,
    /// Read an index/membership/key out of the current value.
    Get { location: String },
    /// Remove an index/member/key from the current collection.
    Remove { location: String },
    /// Apply a binary operator to two operands.
    Op {
        op: String,
        left: String,
        right: String,
    },
    /// Apply a unary operator to one operand.
    Unary { op: String, value: String },
    /// Assign a value into a named variable.
    Assign { var_name: String, value: String },
    /// Delete a variable.
    Delete { var_name: String },
    /// Load a variable as the current value.
    Load { var_name: String },
    /// Call a builtin, stored, graph, or exploration function.
    Call { target: String, function: String },
    /// Conditionally jump by a relative amount or to a label.
    Skip { condition: String, amount: String },
    /// A no-op jump target for `skip`.
    Label { name: String },
}

impl Command {
    /// The command keyword this variant is written as.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Val { .. } => "val",
            Command::Empty { .. } => "empty",
            Command::Append { .. } => "append",
            Command::Set { .. } => "set",
            Command::Pop => "pop",
            Command::Get { .. } => "get",
            Command::Remove { .. } => "remove",
            Command::Op { .. } => "op",
            Command::Unary { .. } => "unary",
            Command::Assign { .. } => "assign",
            Command::Delete { .. } => "delete",
            Command::Load { .. } => "load",
            Command::Call { .. } => "call",
            Command::Skip { .. } => "skip",
            Command::Label { .. } => "label",
        }
    }

    /// Assemble a command from its keyword and argument strings,
    /// validating arity and argument shapes. Up to two missing arguments
    /// are back-filled with `$_` and `$__`.
    pub fn build(name: &str, args: &[&str]) -> Result<Command, CommandBuildError> {
        match name {
            "val" => {
                let args = fix_args(name, 1, args)?;
                requires_value(name, "1st", &args[0])?;
                Ok(Command::Val {
                    value: args[0].clone(),
                })
            }
            "empty" => {
                let args = fix_args(name, 1, args)?;
                requires_literal_or_variable(name, "1st", COLLECTION_KINDS, &args[0])?;
                Ok(Command::Empty {
                    collection: args[0].clone(),
                })
            }
            "append" => {
                let args = fix_args(name, 1, args)?;
                requires_value_or_variable(name, "1st", &args[0])?;
                Ok(Command::Append {
                    value: args[0].clone(),
                })
            }
            "set" => {
                let args = fix_args(name, 2, args)?;
                requires_value_or_variable(name, "1st", &args[0])?;
                requires_value_or_variable(name, "2nd", &args[1])?;
                Ok(Command::Set {
                    location: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            "pop" => {
                fix_args(name, 0, args)?;
                Ok(Command::Pop)
            }
            "get" => {
                let args = fix_args(name, 1, args)?;
                requires_value_or_variable(name, "1st", &args[0])?;
                Ok(Command::Get {
                    location: args[0].clone(),
                })
            }
            "remove" => {
                let args = fix_args(name, 1, args)?;
                requires_value_or_variable(name, "1st", &args[0])?;
                Ok(Command::Remove {
                    location: args[0].clone(),
                })
            }
            "op" => {
                let args = fix_args(name, 3, args)?;
                requires_literal_or_variable(name, "1st", BINARY_OPERATORS, &args[0])?;
                requires_value_or_variable(name, "2nd", &args[1])?;
                requires_value_or_variable(name, "3rd", &args[2])?;
                Ok(Command::Op {
                    op: args[0].clone(),
                    left: args[1].clone(),
                    right: args[2].clone(),
                })
            }
            "unary" => {
                let args = fix_args(name, 2, args)?;
                requires_literal_or_variable(name, "1st", UNARY_OPERATORS, &args[0])?;
                requires_value_or_variable(name, "2nd", &args[1])?;
                Ok(Command::Unary {
                    op: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            "assign" => {
                let args = fix_args(name, 2, args)?;
                requires_variable_name(name, "1st", &args[0])?;
                requires_value_or_variable(name, "2nd", &args[1])?;
                Ok(Command::Assign {
                    var_name: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            "delete" => {
                let args = fix_args(name, 1, args)?;
                requires_variable_name(name, "1st", &args[0])?;
                Ok(Command::Delete {
                    var_name: args[0].clone(),
                })
            }
            "load" => {
                let args = fix_args(name, 1, args)?;
                requires_variable_name(name, "1st", &args[0])?;
                Ok(Command::Load {
                    var_name: args[0].clone(),
                })
            }
            "call" => {
                let args = fix_args(name, 2, args)?;
                requires_literal_or_variable(name, "1st", CALL_TARGETS, &args[0])?;
                requires_variable_name(name, "2nd", &args[1])?;
                Ok(Command::Call {
                    target: args[0].clone(),
                    function: args[1].clone(),
                })
            }
            "skip" => {
                let args = fix_args(name, 2, args)?;
                requires_value_or_variable(name, "1st", &args[0])?;
                requires_value_or_variable(name, "2nd", &args[1])?;
                Ok(Command::Skip {
                    condition: args[0].clone(),
                    amount: args[1].clone(),
                })
            }
            "label" => {
                let args = fix_args(name, 1, args)?;
                requires_variable_name(name, "1st", &args[0])?;
                Ok(Command::Label {
                    name: args[0].clone(),
                })
            }
            other => Err(CommandBuildError::UnknownCommand {
                name: other.to_string(),
            }),
        }
    }
}

/// Whether a string is a valid literal value: `None`, `True`, `False`,
/// an integer, a float, or a quoted string (single or double quotes,
/// backslash escapes).
pub fn is_simple_value(value: &str) -> bool {
    if matches!(value, "None" | "True" | "False") {
        return true;
    }
    if value.parse::<i64>().is_ok() || value.parse::<f64>().is_ok() {
        return true;
    }
    let mut chars = value.chars();
    let quote = match chars.next() {
        Some(c @ ('"' | '\'')) => c,
        _ => return false,
    };
    if value.len() < 2 || !value.ends_with(quote) {
        return false;
    }
    // No unescaped quote may appear in the interior
    let interior: Vec<char> = value.chars().collect();
    let mut i = 1;
    while i + 1 < interior.len() {
        if interior[i] == '\\' {
            i += 2;
        } else if interior[i] == quote {
            return false;
        } else {
            i += 1;
        }
    }
    // A trailing escape would swallow the closing quote
    i == interior.len() - 1
}

/// Whether a string is a variable reference: `$` plus an identifier, or
/// `$@` plus an optional identifier (the implicit edit-scope bindings).
pub fn is_variable_reference(value: &str) -> bool {
    let rest = match value.strip_prefix('$') {
        Some(rest) if !rest.is_empty() => rest,
        _ => return false,
    };
    if let Some(after_at) = rest.strip_prefix('@') {
        return after_at.is_empty() || is_identifier(after_at);
    }
    is_identifier(rest)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Check arity, back-filling up to two missing arguments with `$_` and
/// `$__`.
fn fix_args(
    command: &str,
    requires: usize,
    args: &[&str],
) -> Result<Vec<String>, CommandBuildError> {
    if args.len() > requires || args.len() + 2 < requires {
        return Err(CommandBuildError::WrongArity {
            command: command.to_string(),
            requires,
            given: args.len(),
        });
    }
    let mut filled: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    for default in ["$_", "$__"] {
        if filled.len() < requires {
            filled.push(default.to_string());
        }
    }
    Ok(filled)
}

fn requires_value(command: &str, arg_desc: &str, arg: &str) -> Result<(), CommandBuildError> {
    if is_simple_value(arg) {
        Ok(())
    } else {
        Err(CommandBuildError::BadArgument {
            command: command.to_string(),
            arg_desc: arg_desc.to_string(),
            detail: format!("'{arg}' is not a simple value"),
        })
    }
}

fn requires_value_or_variable(
    command: &str,
    arg_desc: &str,
    arg: &str,
) -> Result<(), CommandBuildError> {
    if is_simple_value(arg) || is_variable_reference(arg) {
        Ok(())
    } else {
        Err(CommandBuildError::BadArgument {
            command: command.to_string(),
            arg_desc: arg_desc.to_string(),
            detail: format!("'{arg}' is neither a simple value nor a variable reference"),
        })
    }
}

fn requires_variable_name(
    command: &str,
    arg_desc: &str,
    arg: &str,
) -> Result<(), CommandBuildError> {
    if is_variable_reference(arg) || is_variable_reference(&format!("${arg}")) {
        Ok(())
    } else {
        Err(CommandBuildError::BadArgument {
            command: command.to_string(),
            arg_desc: arg_desc.to_string(),
            detail: format!("'{arg}' is not a variable name or reference"),
        })
    }
}

fn requires_literal_or_variable(
    command: &str,
    arg_desc: &str,
    options: &[&str],
    arg: &str,
) -> Result<(), CommandBuildError> {
    if is_variable_reference(arg) || options.contains(&arg) {
        Ok(())
    } else {
        Err(CommandBuildError::BadArgument {
            command: command.to_string(),
            arg_desc: arg_desc.to_string(),
            detail: format!(
                "'{arg}' must be a variable reference or one of: {}",
                options.join(", ")
            ),
        })
    }
}

/// Parse a command-list text block: one command per line, whitespace
/// separated, with quoted strings (kept verbatim, quotes and escapes
/// included, so literal classification sees them), `#` comments, and
/// blank lines ignored.
pub fn parse_command_list(text: &str) -> Result<Vec<Command>, CommandParseError> {
    let mut line = 1usize;
    let mut pos_on_line = 0usize;
    let mut quote_start = (0usize, 0usize);
    let mut in_quote: Option<char> = None;
    let mut in_comment = false;
    let mut escaped = false;
    let mut lines: Vec<(usize, Vec<String>)> = Vec::new();
    let mut line_pieces: Vec<String> = Vec::new();
    let mut current_piece: Option<String> = None;

    for c in text.chars() {
        let at = (line, pos_on_line);
        if c == '\n' {
            line += 1;
            pos_on_line = 0;
        } else {
            pos_on_line += 1;
        }

        if let Some(quote) = in_quote {
            let piece = current_piece.as_mut().expect("quote implies a piece");
            if escaped {
                piece.push(c);
                escaped = false;
            } else if c == quote {
                piece.push(c);
                in_quote = None;
            } else if c == '\\' {
                piece.push(c);
                escaped = true;
            } else {
                piece.push(c);
            }
        } else if in_comment {
            if c == '\n' {
                in_comment = false;
                if !line_pieces.is_empty() {
                    lines.push((at.0, std::mem::take(&mut line_pieces)));
                }
            }
        } else if c == '\n' {
            if let Some(piece) = current_piece.take() {
                line_pieces.push(piece);
            }
            if !line_pieces.is_empty() {
                lines.push((at.0, std::mem::take(&mut line_pieces)));
            }
        } else if c.is_whitespace() {
            if let Some(piece) = current_piece.take() {
                line_pieces.push(piece);
            }
        } else if c == '"' || c == '\'' {
            in_quote = Some(c);
            quote_start = at;
            current_piece.get_or_insert_with(String::new).push(c);
        } else if c == '#' {
            in_comment = true;
            if let Some(piece) = current_piece.take() {
                line_pieces.push(piece);
            }
        } else {
            current_piece.get_or_insert_with(String::new).push(c);
        }
    }

    if in_quote.is_some() {
        return Err(CommandParseError::UnterminatedQuote {
            line: quote_start.0,
            column: quote_start.1,
        });
    }
    if let Some(piece) = current_piece.take() {
        line_pieces.push(piece);
    }
    if !line_pieces.is_empty() {
        lines.push((line, line_pieces));
    }

    let mut result = Vec::new();
    for (line_no, pieces) in lines {
        let args: Vec<&str> = pieces[1..].iter().map(String::as_str).collect();
        let command = Command::build(&pieces[0], &args)
            .map_err(|source| CommandParseError::BadCommand { line: line_no, source })?;
        result.push(command);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_values() {
        assert!(is_simple_value("None"));
        assert!(is_simple_value("True"));
        assert!(is_simple_value("False"));
        assert!(!is_simple_value("none"));
        assert!(is_simple_value("12"));
        assert!(is_simple_value("5.6"));
        assert!(is_simple_value("3.2e-10"));
        assert!(!is_simple_value("hello"));
        assert!(is_simple_value("\"hello\""));
        assert!(!is_simple_value("\"hel\"lo\""));
        assert!(is_simple_value("\"hel\\\"lo\""));
        assert!(is_simple_value("'hi'"));
        assert!(is_simple_value("'don\\'t'"));
        assert!(!is_simple_value(""));
        assert!(!is_simple_value("'"));
    }

    #[test]
    fn variable_references() {
        assert!(is_variable_reference("$hi"));
        assert!(!is_variable_reference("$good bye"));
        assert!(is_variable_reference("$_"));
        assert!(!is_variable_reference("$123"));
        assert!(!is_variable_reference("$1ab"));
        assert!(is_variable_reference("$ab1"));
        assert!(!is_variable_reference("hi"));
        assert!(!is_variable_reference(""));
        assert!(is_variable_reference("$@"));
        assert!(is_variable_reference("$@a"));
        assert!(!is_variable_reference("$@1"));
    }

    #[test]
    fn build_val() {
        assert_eq!(
            Command::build("val", &["5"]).unwrap(),
            Command::Val { value: "5".into() }
        );
        // Back-fill produces '$_' which is not a simple value
        assert!(Command::build("val", &[]).is_err());
    }

    #[test]
    fn build_empty() {
        assert_eq!(
            Command::build("empty", &[]).unwrap(),
            Command::Empty {
                collection: "$_".into()
            }
        );
        assert_eq!(
            Command::build("empty", &["list"]).unwrap(),
            Command::Empty {
                collection: "list".into()
            }
        );
        assert!(Command::build("empty", &["invalid"]).is_err());
        assert!(Command::build("empty", &["list", "dict"]).is_err());
    }

    #[test]
    fn build_unknown() {
        assert!(matches!(
            Command::build("frobnicate", &[]),
            Err(CommandBuildError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn parse_basic_block() {
        let commands = parse_command_list(
            "val 5\n\
             empty list\n\
             # comment\n\
             \x20 append  # indentation is ignored\n",
        )
        .unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], Command::Val { value: "5".into() });
        assert_eq!(
            commands[1],
            Command::Empty {
                collection: "list".into()
            }
        );
        assert_eq!(commands[2], Command::Append { value: "$_".into() });
    }

    #[test]
    fn parse_quoted_pieces() {
        let commands = parse_command_list("val \"two words\"\nassign name 'it\\'s'\n").unwrap();
        assert_eq!(
            commands[0],
            Command::Val {
                value: "\"two words\"".into()
            }
        );
        assert_eq!(
            commands[1],
            Command::Assign {
                var_name: "name".into(),
                value: "'it\\'s'".into()
            }
        );
    }

    #[test]
    fn parse_hash_inside_quote() {
        let commands = parse_command_list("val \"a#b\" # real comment\n").unwrap();
        assert_eq!(
            commands[0],
            Command::Val {
                value: "\"a#b\"".into()
            }
        );
    }

    #[test]
    fn parse_unterminated_quote() {
        assert!(matches!(
            parse_command_list("val \"oops\n"),
            Err(CommandParseError::UnterminatedQuote { .. })
        ));
    }

    #[test]
    fn parse_reports_line() {
        let err = parse_command_list("val 5\nbogus 1\n").unwrap_err();
        match err {
            CommandParseError::BadCommand { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_last_line_without_newline() {
        let commands = parse_command_list("val 1\nval 2").unwrap();
        assert_eq!(commands.len(), 2);
    }
}

//! Command execution: single commands, builtins, and block control flow.

use std::collections::BTreeMap;

use wayfarer_core::Command;

use crate::error::{CommandError, Fault};
use crate::scope::{Scope, CURRENT, PREVIOUS};
use crate::value::{binary_op, compare, unary_op, Value};

/// Where a `skip` command sends execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipTo {
    /// A relative offset: 0 continues normally, negative re-executes
    /// earlier commands, positive jumps over later ones.
    Relative(i64),
    /// A named label.
    Label(String),
}

/// The control-flow outcome of a single command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    /// A jump requested by a `skip` command whose condition held.
    pub skip: Option<SkipTo>,
    /// A label defined by a `label` command.
    pub label: Option<String>,
}

/// The seam through which `call graph` and `call exploration` commands
/// reach the decision graph and exploration. Implementations pull their
/// arguments by parameter name out of the scope.
pub trait CallHost {
    fn call_graph(&mut self, function: &str, scope: &mut Scope) -> Result<Value, Fault>;
    fn call_exploration(&mut self, function: &str, scope: &mut Scope) -> Result<Value, Fault>;
}

/// A host with no graph or exploration attached; graph and exploration
/// calls fail.
pub struct NoHost;

impl CallHost for NoHost {
    fn call_graph(&mut self, function: &str, _scope: &mut Scope) -> Result<Value, Fault> {
        Err(Fault::Type(format!(
            "cannot call graph method '{function}': no graph is attached"
        )))
    }

    fn call_exploration(&mut self, function: &str, _scope: &mut Scope) -> Result<Value, Fault> {
        Err(Fault::Type(format!(
            "cannot call exploration method '{function}': no exploration is attached"
        )))
    }
}

/// Run a single command against a scope, returning its control-flow
/// outcome. Faults are wrapped with the command and line number.
pub fn run_command(
    host: &mut dyn CallHost,
    command: &Command,
    scope: &mut Scope,
    line: usize,
) -> Result<CommandOutcome, CommandError> {
    exec(host, command, scope).map_err(|fault| CommandError::from_fault(fault, command, line))
}

fn exec(
    host: &mut dyn CallHost,
    command: &Command,
    scope: &mut Scope,
) -> Result<CommandOutcome, Fault> {
    let mut outcome = CommandOutcome::default();
    match command {
        Command::Val { value } => {
            let resolved = scope.resolve_value(value)?;
            scope.push_current(resolved);
        }

        Command::Empty { collection } => {
            let kind = scope.resolve_var_name(collection)?;
            let empty = match kind.as_str() {
                "list" => Value::List(Vec::new()),
                "tuple" => Value::Tuple(Vec::new()),
                "set" => Value::Set(Default::default()),
                "dict" => Value::Dict(Default::default()),
                other => return Err(Fault::Key(format!("unknown collection kind '{other}'"))),
            };
            scope.push_current(empty);
        }

        Command::Append { value } => {
            let addition = scope.resolve_value(value)?;
            let mut target = scope.current()?.clone();
            match &mut target {
                Value::List(items) => items.push(addition),
                Value::Tuple(items) => items.push(addition),
                Value::Set(items) => {
                    items.insert(addition);
                }
                Value::Dict(_) => {
                    return Err(Fault::Type(
                        "'append' cannot be used with a dict; use 'set' instead".to_string(),
                    ));
                }
                other => {
                    return Err(Fault::Type(format!(
                        "'append' needs a list, tuple, or set as the current value, got {}",
                        other.type_name()
                    )));
                }
            }
            scope.set(CURRENT, target);
        }

        Command::Set { location, value } => {
            let place = scope.resolve_value(location)?;
            let what = scope.resolve_value(value)?;
            let mut target = scope.current()?.clone();
            match &mut target {
                Value::List(items) | Value::Tuple(items) => {
                    let index = normalize_index(&place, items.len(), "set")?;
                    items[index] = what;
                }
                Value::Set(items) => {
                    if what.truthy() {
                        items.insert(place);
                    } else {
                        items.remove(&place);
                    }
                }
                Value::Dict(entries) => {
                    entries.insert(place, what);
                }
                other => {
                    return Err(Fault::Type(format!(
                        "'set' needs a collection as the current value, got {}",
                        other.type_name()
                    )));
                }
            }
            scope.set(CURRENT, target);
        }

        Command::Pop => {
            let target = scope.current()?.clone();
            match target {
                Value::List(mut items) => {
                    let popped = items
                        .pop()
                        .ok_or_else(|| Fault::Index("cannot pop from an empty list".to_string()))?;
                    scope.set(PREVIOUS, Value::List(items));
                    scope.set(CURRENT, popped);
                }
                Value::Tuple(mut items) => {
                    let popped = items.pop().ok_or_else(|| {
                        Fault::Index("cannot pop from an empty tuple".to_string())
                    })?;
                    scope.set(PREVIOUS, Value::Tuple(items));
                    scope.set(CURRENT, popped);
                }
                other => {
                    return Err(Fault::Type(format!(
                        "cannot 'pop' from a {} (current value must be a list or tuple)",
                        other.type_name()
                    )));
                }
            }
        }

        Command::Get { location } => {
            let place = scope.resolve_value(location)?;
            let target = scope.current()?.clone();
            let result = match &target {
                Value::List(items) | Value::Tuple(items) => {
                    let index = normalize_index(&place, items.len(), "get")?;
                    items[index].clone()
                }
                Value::Set(items) => Value::Bool(items.contains(&place)),
                Value::Dict(entries) => entries
                    .get(&place)
                    .cloned()
                    .ok_or_else(|| Fault::Key(format!("no entry for key {place}")))?,
                other => {
                    return Err(Fault::Type(format!(
                        "cannot 'get' from a {}",
                        other.type_name()
                    )));
                }
            };
            scope.push_current(result);
        }

        Command::Remove { location } => {
            let place = scope.resolve_value(location)?;
            let mut target = scope.current()?.clone();
            match &mut target {
                Value::List(items) | Value::Tuple(items) => {
                    let index = normalize_index(&place, items.len(), "remove")?;
                    items.remove(index);
                }
                Value::Set(items) => {
                    if !items.remove(&place) {
                        return Err(Fault::Key(format!("{place} is not in the set")));
                    }
                }
                Value::Dict(entries) => {
                    if entries.remove(&place).is_none() {
                        return Err(Fault::Key(format!("no entry for key {place}")));
                    }
                }
                other => {
                    return Err(Fault::Type(format!(
                        "cannot use 'remove' on a {}",
                        other.type_name()
                    )));
                }
            }
            scope.set(CURRENT, target);
        }

        Command::Op { op, left, right } => {
            let op = scope.resolve_var_name(op)?;
            let lhs = scope.resolve_value(left)?;
            let rhs = scope.resolve_value(right)?;
            let result = binary_op(&op, &lhs, &rhs)?;
            scope.push_current(result);
        }

        Command::Unary { op, value } => {
            let op = scope.resolve_var_name(op)?;
            let operand = scope.resolve_value(value)?;
            let result = unary_op(&op, &operand)?;
            scope.push_current(result);
        }

        Command::Assign { var_name, value } => {
            let name = scope.resolve_var_name(var_name)?;
            let resolved = scope.resolve_value(value)?;
            scope.set(name, resolved);
        }

        Command::Delete { var_name } => {
            let name = scope.resolve_var_name(var_name)?;
            if scope.delete(&name).is_none() {
                return Err(Fault::Key(format!("variable '{name}' is not defined")));
            }
        }

        Command::Load { var_name } => {
            let name = scope.resolve_var_name(var_name)?;
            let value = scope
                .get(&name)
                .cloned()
                .ok_or_else(|| Fault::Key(format!("variable '{name}' is not defined")))?;
            scope.push_current(value);
        }

        Command::Call { target, function } => {
            let target = scope.resolve_var_name(target)?;
            let function = scope.resolve_var_name(function)?;
            let result = match target.as_str() {
                "builtin" => call_builtin(&function, scope)?,
                "stored" => {
                    // The variable names a builtin to run
                    let named = scope
                        .get(&function)
                        .cloned()
                        .ok_or_else(|| Fault::Key(format!("variable '{function}' is not defined")))?;
                    let name = named.as_str("stored call target")?.to_string();
                    call_builtin(&name, scope)?
                }
                "graph" => host.call_graph(&function, scope)?,
                "exploration" => host.call_exploration(&function, scope)?,
                other => {
                    return Err(Fault::Type(format!(
                        "invalid call target '{other}' (must be builtin, stored, graph, or \
                         exploration)"
                    )));
                }
            };
            scope.push_current(result);
        }

        Command::Skip { condition, amount } => {
            let go = scope.resolve_value(condition)?;
            if go.truthy() {
                outcome.skip = Some(match scope.resolve_value(amount)? {
                    Value::Int(n) => SkipTo::Relative(n),
                    Value::Str(name) => SkipTo::Label(name),
                    other => {
                        return Err(Fault::Type(format!(
                            "skip amount must be an integer or a label name, got {}",
                            other.type_name()
                        )));
                    }
                });
            }
        }

        Command::Label { name } => {
            let label = if name.starts_with('$') {
                match scope.resolve_value(name)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(Fault::Type(format!(
                            "label name must be a string, got {}",
                            other.type_name()
                        )));
                    }
                }
            } else {
                name.clone()
            };
            outcome.label = Some(label);
        }
    }
    Ok(outcome)
}

/// Run a command block to completion. A skip past the end halts
/// execution; a skip before the beginning restarts from the first
/// command. Label jumps prefer the nearest previous occurrence, falling
/// back to the nearest future one, and may scan ahead for literal labels
/// that haven't executed yet.
pub fn run_command_block(
    host: &mut dyn CallHost,
    commands: &[Command],
    scope: &mut Scope,
) -> Result<(), CommandError> {
    let mut label_positions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut index = 0usize;

    while index < commands.len() {
        let command = &commands[index];
        let outcome = run_command(host, command, scope, index + 1)?;

        match outcome.skip {
            None => index += 1,
            Some(SkipTo::Relative(offset)) => {
                if offset < 0 {
                    let back = offset.unsigned_abs() as usize;
                    index = index.saturating_sub(back);
                } else {
                    index += offset as usize + 1;
                }
            }
            Some(SkipTo::Label(name)) => {
                if let Some(positions) = label_positions.get(&name) {
                    let previous = positions.iter().filter(|&&p| p < index).max();
                    let future = positions.iter().filter(|&&p| p >= index).min();
                    index = match previous.or(future) {
                        Some(&p) => p,
                        None => unreachable!("recorded label has at least one position"),
                    };
                } else {
                    // Scan ahead for a literal label that hasn't run yet
                    let found = commands
                        .iter()
                        .enumerate()
                        .skip(index + 1)
                        .find(|(_, c)| matches!(c, Command::Label { name: n } if *n == name))
                        .map(|(i, _)| i);
                    index = found.ok_or_else(|| {
                        CommandError::from_fault(
                            Fault::Key(format!(
                                "no label '{name}' has been defined before this skip, and no \
                                 future literal label uses that name"
                            )),
                            command,
                            index + 1,
                        )
                    })?;
                }
            }
        }

        if let Some(label) = outcome.label {
            label_positions.entry(label).or_default().push(index);
        }
    }

    Ok(())
}

// --- Builtins ---

/// Call a builtin by name. Builtins take the current value as their
/// argument; `round` reads an optional `ndigits` variable, and `range`
/// reads `start`/`stop`/`step` when the current value is `None`.
fn call_builtin(name: &str, scope: &mut Scope) -> Result<Value, Fault> {
    match name {
        "len" => {
            let value = scope.current()?;
            let length = match value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) | Value::Tuple(items) => items.len(),
                Value::Set(items) => items.len(),
                Value::Dict(entries) => entries.len(),
                other => {
                    return Err(Fault::Type(format!(
                        "object of type {} has no length",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(length as i64))
        }
        "min" | "max" => {
            let items = iterable_items(scope.current()?, name)?;
            let mut best: Option<Value> = None;
            for item in items {
                best = Some(match best {
                    None => item,
                    Some(current) => {
                        let ordering = compare(name, &item, &current)?;
                        let take = if name == "min" {
                            ordering == std::cmp::Ordering::Less
                        } else {
                            ordering == std::cmp::Ordering::Greater
                        };
                        if take {
                            item
                        } else {
                            current
                        }
                    }
                });
            }
            best.ok_or_else(|| Fault::Value(format!("{name}() of an empty collection")))
        }
        "round" => {
            let value = scope.current()?.clone();
            let ndigits = match scope.get("ndigits") {
                Some(v) => Some(v.as_int("ndigits")?),
                None => None,
            };
            match (value, ndigits) {
                (Value::Int(n), _) => Ok(Value::Int(n)),
                (Value::Float(x), None) => Ok(Value::Int(x.round() as i64)),
                (Value::Float(x), Some(d)) => {
                    let factor = 10f64.powi(d as i32);
                    Ok(Value::Float((x * factor).round() / factor))
                }
                (other, _) => Err(Fault::Type(format!(
                    "cannot round a {}",
                    other.type_name()
                ))),
            }
        }
        "ceil" => match scope.current()? {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(x) => Ok(Value::Int(x.ceil() as i64)),
            other => Err(Fault::Type(format!(
                "cannot take the ceiling of a {}",
                other.type_name()
            ))),
        },
        "floor" => match scope.current()? {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(x) => Ok(Value::Int(x.floor() as i64)),
            other => Err(Fault::Type(format!(
                "cannot take the floor of a {}",
                other.type_name()
            ))),
        },
        "int" => match scope.current()? {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(x) => Ok(Value::Int(*x as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Fault::Value(format!("invalid integer literal '{s}'"))),
            other => Err(Fault::Type(format!(
                "cannot convert a {} to an int",
                other.type_name()
            ))),
        },
        "float" => match scope.current()? {
            Value::Int(n) => Ok(Value::Float(*n as f64)),
            Value::Float(x) => Ok(Value::Float(*x)),
            Value::Bool(b) => Ok(Value::Float(*b as i64 as f64)),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| Fault::Value(format!("invalid float literal '{s}'"))),
            other => Err(Fault::Type(format!(
                "cannot convert a {} to a float",
                other.type_name()
            ))),
        },
        "str" => Ok(Value::Str(scope.current()?.to_string())),
        "list" => Ok(Value::List(iterable_items(scope.current()?, name)?)),
        "tuple" => Ok(Value::Tuple(iterable_items(scope.current()?, name)?)),
        "set" => Ok(Value::Set(
            iterable_items(scope.current()?, name)?.into_iter().collect(),
        )),
        "dict" => match scope.current()? {
            Value::Dict(entries) => Ok(Value::Dict(entries.clone())),
            Value::List(pairs) | Value::Tuple(pairs) => {
                let mut entries = BTreeMap::new();
                for pair in pairs {
                    match pair {
                        Value::List(kv) | Value::Tuple(kv) if kv.len() == 2 => {
                            entries.insert(kv[0].clone(), kv[1].clone());
                        }
                        _ => {
                            return Err(Fault::Value(
                                "dict() needs a sequence of key/value pairs".to_string(),
                            ));
                        }
                    }
                }
                Ok(Value::Dict(entries))
            }
            other => Err(Fault::Type(format!(
                "cannot build a dict from a {}",
                other.type_name()
            ))),
        },
        "copy" | "deepcopy" => Ok(scope.current()?.clone()),
        "range" => {
            let current = scope.current()?.clone();
            let (start, stop, step) = match current {
                Value::None => {
                    let start = match scope.get("start") {
                        Some(v) => v.as_int("start")?,
                        None => 0,
                    };
                    let stop = scope
                        .get("stop")
                        .ok_or_else(|| Fault::Key("range() needs a 'stop' variable".to_string()))?
                        .as_int("stop")?;
                    let step = match scope.get("step") {
                        Some(v) => v.as_int("step")?,
                        None => 1,
                    };
                    (start, stop, step)
                }
                other => (0, other.as_int("range stop")?, 1),
            };
            if step == 0 {
                return Err(Fault::Value("range() step must not be zero".to_string()));
            }
            let mut items = Vec::new();
            let mut at = start;
            while (step > 0 && at < stop) || (step < 0 && at > stop) {
                items.push(Value::Int(at));
                at += step;
            }
            Ok(Value::List(items))
        }
        "reversed" => match scope.current()? {
            Value::Str(s) => Ok(Value::Str(s.chars().rev().collect())),
            Value::List(items) => Ok(Value::List(items.iter().rev().cloned().collect())),
            Value::Tuple(items) => Ok(Value::Tuple(items.iter().rev().cloned().collect())),
            other => Err(Fault::Type(format!(
                "cannot reverse a {}",
                other.type_name()
            ))),
        },
        "sorted" => {
            let mut items = iterable_items(scope.current()?, name)?;
            // Verify comparability up front so sort can't panic
            for window in items.windows(2) {
                compare("sorted", &window[0], &window[1])?;
            }
            items.sort();
            Ok(Value::List(items))
        }
        "print" => {
            let value = scope.current()?;
            println!("{value}");
            Ok(Value::None)
        }
        "warning" => {
            let value = scope.current()?;
            eprintln!("warning: {value}");
            Ok(Value::None)
        }
        other => Err(Fault::Key(format!("no builtin named '{other}'"))),
    }
}

fn iterable_items(value: &Value, context: &str) -> Result<Vec<Value>, Fault> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items.clone()),
        Value::Set(items) => Ok(items.iter().cloned().collect()),
        Value::Dict(entries) => Ok(entries.keys().cloned().collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(Fault::Type(format!(
            "{context}() needs an iterable, got {}",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly-negative index into a sequence of the given
/// length.
fn normalize_index(place: &Value, len: usize, context: &str) -> Result<usize, Fault> {
    let raw = match place {
        Value::Int(n) => *n,
        other => {
            return Err(Fault::Type(format!(
                "'{context}' index {other} is not an integer"
            )));
        }
    };
    let adjusted = if raw < 0 { raw + len as i64 } else { raw };
    if adjusted < 0 || adjusted as usize >= len {
        return Err(Fault::Index(format!(
            "index {raw} out of range for length {len}"
        )));
    }
    Ok(adjusted as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::parse_command_list;

    fn run(text: &str) -> Scope {
        let commands = parse_command_list(text).unwrap();
        let mut scope = Scope::new();
        run_command_block(&mut NoHost, &commands, &mut scope).unwrap();
        scope
    }

    #[test]
    fn current_value_shifting() {
        // 'empty' overwrites '_', pushing the old 5 into '__'
        let scope = run("val 5\nempty list\nappend $__\n");
        assert_eq!(
            scope.get(CURRENT),
            Some(&Value::List(vec![Value::Int(5)]))
        );
    }

    #[test]
    fn arithmetic_block() {
        let scope = run("val 2\nassign x\nop * $x 21\n");
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(42)));
    }

    #[test]
    fn collections_block() {
        let scope = run(
            "empty dict\n\
             set 'one' 1\n\
             set 'two' 2\n\
             get 'two'\n",
        );
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(2)));
    }

    #[test]
    fn set_by_truthiness() {
        let scope = run(
            "empty set\n\
             set 'a' True\n\
             set 'b' True\n\
             set 'a' False\n",
        );
        assert_eq!(
            scope.get(CURRENT),
            Some(&Value::Set(
                [Value::Str("b".into())].into_iter().collect()
            ))
        );
    }

    #[test]
    fn pop_shifts_remainder() {
        let scope = run("empty list\nappend 1\nappend 2\npop\n");
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(2)));
        assert_eq!(
            scope.get(PREVIOUS),
            Some(&Value::List(vec![Value::Int(1)]))
        );
    }

    #[test]
    fn negative_indexing() {
        let scope = run("empty list\nappend 10\nappend 20\nget -1\n");
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(20)));
    }

    #[test]
    fn skip_forward() {
        // The middle assignment is skipped
        let scope = run(
            "assign x 1\n\
             skip True 1\n\
             assign x 2\n\
             assign y 3\n",
        );
        assert_eq!(scope.get("x"), Some(&Value::Int(1)));
        assert_eq!(scope.get("y"), Some(&Value::Int(3)));
    }

    #[test]
    fn skip_false_condition_continues() {
        let scope = run("skip False 1\nassign x 2\n");
        assert_eq!(scope.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn skip_past_end_halts() {
        let scope = run("assign x 1\nskip True 100\nassign x 2\n");
        assert_eq!(scope.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn skip_to_forward_label() {
        let scope = run(
            "skip True 'end'\n\
             assign x 1\n\
             label end\n\
             assign y 2\n",
        );
        assert_eq!(scope.get("x"), None);
        assert_eq!(scope.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn label_loop_counts_down() {
        let scope = run(
            "assign n 3\n\
             label top\n\
             op - $n 1\n\
             assign n $_\n\
             op > $n 0\n\
             skip $_ 'top'\n",
        );
        assert_eq!(scope.get("n"), Some(&Value::Int(0)));
    }

    #[test]
    fn skip_to_missing_label_fails() {
        let commands = parse_command_list("skip True 'nowhere'\n").unwrap();
        let mut scope = Scope::new();
        let result = run_command_block(&mut NoHost, &commands, &mut scope);
        assert!(matches!(result, Err(CommandError::Key { .. })));
    }

    #[test]
    fn builtin_len_and_sorted() {
        let scope = run(
            "empty list\nappend 3\nappend 1\nappend 2\n\
             call builtin sorted\nassign s\nload s\ncall builtin len\n",
        );
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(3)));
        assert_eq!(
            scope.get("s"),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3)
            ]))
        );
    }

    #[test]
    fn builtin_range_from_scope() {
        let scope = run("assign stop 4\nval None\ncall builtin range\n");
        assert_eq!(
            scope.get(CURRENT),
            Some(&Value::List(vec![
                Value::Int(0),
                Value::Int(1),
                Value::Int(2),
                Value::Int(3)
            ]))
        );
    }

    #[test]
    fn builtin_round_with_ndigits() {
        let scope = run("assign ndigits 1\nval 2.25\ncall builtin round\n");
        assert_eq!(scope.get(CURRENT), Some(&Value::Float(2.3)));
    }

    #[test]
    fn stored_call_names_builtin() {
        let scope = run("assign f 'len'\nval 'word'\ncall stored f\n");
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(4)));
    }

    #[test]
    fn delete_and_load() {
        let commands = parse_command_list("assign x 1\ndelete x\nload x\n").unwrap();
        let mut scope = Scope::new();
        let result = run_command_block(&mut NoHost, &commands, &mut scope);
        assert!(matches!(result, Err(CommandError::Key { .. })));
    }

    #[test]
    fn graph_call_without_host_fails() {
        let commands = parse_command_list("call graph destination\n").unwrap();
        let mut scope = Scope::new();
        let result = run_command_block(&mut NoHost, &commands, &mut scope);
        assert!(matches!(result, Err(CommandError::Type { .. })));
    }

    #[test]
    fn error_carries_line_number() {
        let commands = parse_command_list("val 1\nop + $_ 'x'\n").unwrap();
        let mut scope = Scope::new();
        let err = run_command_block(&mut NoHost, &commands, &mut scope).unwrap_err();
        match err {
            CommandError::Type { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Variable scope for command execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wayfarer_core::command::{is_simple_value, is_variable_reference};

use crate::error::Fault;
use crate::value::Value;

/// The variable holding the current value.
pub const CURRENT: &str = "_";

/// The variable holding the previous current value.
pub const PREVIOUS: &str = "__";

/// Maps variable names (without the `$` sigil) to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    vars: BTreeMap<String, Value>,
}

impl Scope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Assign a variable.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Remove a variable, returning its old value if it was defined.
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Whether a variable is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Iterate over all defined variables.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    /// The current value, or a key fault if none has been established.
    pub fn current(&self) -> Result<&Value, Fault> {
        self.vars
            .get(CURRENT)
            .ok_or_else(|| Fault::Key("no current value has been established".to_string()))
    }

    /// Establish a new current value, shifting the old one into `__`.
    pub fn push_current(&mut self, value: Value) {
        if let Some(old) = self.vars.get(CURRENT).cloned() {
            self.vars.insert(PREVIOUS.to_string(), old);
        }
        self.vars.insert(CURRENT.to_string(), value);
    }

    /// Resolve a value string: a `$`-reference reads the named variable;
    /// otherwise the string must be a literal (`None`, `True`, `False`,
    /// a number, or a quoted string).
    pub fn resolve_value(&self, text: &str) -> Result<Value, Fault> {
        if is_variable_reference(text) {
            let name = &text[1..];
            return self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| Fault::Other(format!("variable '{name}' is not defined")));
        }
        if !is_simple_value(text) {
            return Err(Fault::Value(format!(
                "'{text}' is not a valid value (add quotes for a string, or '$' to \
                 reference a variable)"
            )));
        }
        Ok(match text {
            "None" => Value::None,
            "True" => Value::Bool(true),
            "False" => Value::Bool(false),
            _ => {
                if text.starts_with('"') || text.starts_with('\'') {
                    Value::Str(unescape_quoted(text))
                } else if let Ok(n) = text.parse::<i64>() {
                    Value::Int(n)
                } else if let Ok(x) = text.parse::<f64>() {
                    Value::Float(x)
                } else {
                    return Err(Fault::Value(format!("could not interpret value '{text}'")));
                }
            }
        })
    }

    /// Resolve a variable-name string: a `$`-reference reads the named
    /// variable, whose value must be a string naming the real variable;
    /// otherwise the string itself is the name.
    pub fn resolve_var_name(&self, text: &str) -> Result<String, Fault> {
        match text.strip_prefix('$') {
            None => Ok(text.to_string()),
            Some(name) => match self.vars.get(name) {
                None => Err(Fault::Key(format!("variable '{name}' is not defined"))),
                Some(Value::Str(s)) => Ok(s.clone()),
                Some(other) => Err(Fault::Type(format!(
                    "variable '{name}' cannot be used as a variable name: it holds a \
                     {}, not a string",
                    other.type_name()
                ))),
            },
        }
    }
}

/// Strip the outer quotes and process backslash escapes.
fn unescape_quoted(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let end = chars.len().saturating_sub(1);
    let mut out = String::new();
    let mut i = 1;
    while i < end {
        if chars[i] == '\\' && i + 1 < end {
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_current_shifts() {
        let mut scope = Scope::new();
        scope.push_current(Value::Int(5));
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(5)));
        assert_eq!(scope.get(PREVIOUS), None);

        scope.push_current(Value::Int(7));
        assert_eq!(scope.get(CURRENT), Some(&Value::Int(7)));
        assert_eq!(scope.get(PREVIOUS), Some(&Value::Int(5)));
    }

    #[test]
    fn resolve_literals() {
        let scope = Scope::new();
        assert_eq!(scope.resolve_value("None").unwrap(), Value::None);
        assert_eq!(scope.resolve_value("True").unwrap(), Value::Bool(true));
        assert_eq!(scope.resolve_value("12").unwrap(), Value::Int(12));
        assert_eq!(scope.resolve_value("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(
            scope.resolve_value("\"hi\"").unwrap(),
            Value::Str("hi".into())
        );
        assert_eq!(
            scope.resolve_value("'it\\'s'").unwrap(),
            Value::Str("it's".into())
        );
        assert!(scope.resolve_value("bare").is_err());
    }

    #[test]
    fn resolve_references() {
        let mut scope = Scope::new();
        scope.set("x", Value::Int(9));
        assert_eq!(scope.resolve_value("$x").unwrap(), Value::Int(9));
        assert!(scope.resolve_value("$missing").is_err());
    }

    #[test]
    fn resolve_names() {
        let mut scope = Scope::new();
        scope.set("alias", Value::Str("target".into()));
        assert_eq!(scope.resolve_var_name("plain").unwrap(), "plain");
        assert_eq!(scope.resolve_var_name("$alias").unwrap(), "target");
        scope.set("bad", Value::Int(1));
        assert!(scope.resolve_var_name("$bad").is_err());
        assert!(scope.resolve_var_name("$missing").is_err());
    }
}

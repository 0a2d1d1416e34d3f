//! The interpreter's dynamic value type.
//!
//! Values carry a total order (floats via `total_cmp`, cross-type by a
//! fixed type rank) so that sets and dictionary keys can live in BTree
//! collections. Values are plain data: "mutating" a collection produces
//! a new value that the interpreter writes back into the scope.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Fault;

/// A dynamic value manipulated by commands.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(BTreeSet<Value>),
    Dict(BTreeMap<Value, Value>),
}

impl Value {
    /// A short name for the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
        }
    }

    /// Truthiness: `None`, zero, and empty collections are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Set(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
        }
    }

    /// Extract an integer, or fail with a type fault.
    pub fn as_int(&self, context: &str) -> Result<i64, Fault> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(Fault::Type(format!(
                "{context}: expected an int, got {}",
                other.type_name()
            ))),
        }
    }

    /// Extract a string, or fail with a type fault.
    pub fn as_str(&self, context: &str) -> Result<&str, Fault> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(Fault::Type(format!(
                "{context}: expected a string, got {}",
                other.type_name()
            ))),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::None => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::List(_) => 5,
            Value::Tuple(_) => 6,
            Value::Set(_) => 7,
            Value::Dict(_) => 8,
        }
    }

    /// Equality as the `==` operator sees it: ints and floats compare
    /// numerically across types; everything else compares structurally.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::None, Value::None) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Dict(a), Value::Dict(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                write_joined(f, items.iter())?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_joined(f, items.iter())?;
                write!(f, ")")
            }
            Value::Set(items) => {
                write!(f, "{{")?;
                write_joined(f, items.iter())?;
                write!(f, "}}")
            }
            Value::Dict(entries) => {
                write!(f, "{{")?;
                let mut first = true;
                for (key, value) in entries {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    let mut first = true;
    for item in items {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{item}")?;
    }
    Ok(())
}

// --- Operators ---

/// Apply a binary operator.
pub fn binary_op(op: &str, left: &Value, right: &Value) -> Result<Value, Fault> {
    use Value::*;
    match op {
        "+" => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a + b)),
            (Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
            (List(a), List(b)) => Ok(List(a.iter().chain(b).cloned().collect())),
            (Tuple(a), Tuple(b)) => Ok(Tuple(a.iter().chain(b).cloned().collect())),
            _ => numeric(op, left, right, |a, b| a + b),
        },
        "-" => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a - b)),
            (Set(a), Set(b)) => Ok(Set(a.difference(b).cloned().collect())),
            _ => numeric(op, left, right, |a, b| a - b),
        },
        "*" => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a * b)),
            (Str(s), Int(n)) => Ok(Str(s.repeat((*n).max(0) as usize))),
            (List(items), Int(n)) => {
                let mut result = Vec::new();
                for _ in 0..(*n).max(0) {
                    result.extend(items.iter().cloned());
                }
                Ok(List(result))
            }
            _ => numeric(op, left, right, |a, b| a * b),
        },
        "/" => {
            let (a, b) = as_floats(op, left, right)?;
            if b == 0.0 {
                Err(Fault::Other("division by zero".to_string()))
            } else {
                Ok(Float(a / b))
            }
        }
        "//" => match (left, right) {
            (Int(_), Int(0)) => Err(Fault::Other("division by zero".to_string())),
            (Int(a), Int(b)) => Ok(Int(floor_div(*a, *b))),
            _ => {
                let (a, b) = as_floats(op, left, right)?;
                if b == 0.0 {
                    Err(Fault::Other("division by zero".to_string()))
                } else {
                    Ok(Float((a / b).floor()))
                }
            }
        },
        "**" => match (left, right) {
            (Int(a), Int(b)) if *b >= 0 => {
                let exponent = u32::try_from(*b)
                    .map_err(|_| Fault::Other("exponent out of range".to_string()))?;
                a.checked_pow(exponent)
                    .map(Int)
                    .ok_or_else(|| Fault::Other("integer overflow".to_string()))
            }
            _ => {
                let (a, b) = as_floats(op, left, right)?;
                Ok(Float(a.powf(b)))
            }
        },
        "%" => match (left, right) {
            (Int(_), Int(0)) => Err(Fault::Other("division by zero".to_string())),
            (Int(a), Int(b)) => Ok(Int(floor_mod(*a, *b))),
            _ => {
                let (a, b) = as_floats(op, left, right)?;
                if b == 0.0 {
                    Err(Fault::Other("division by zero".to_string()))
                } else {
                    Ok(Float(a - b * (a / b).floor()))
                }
            }
        },
        "^" => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a ^ b)),
            (Bool(a), Bool(b)) => Ok(Bool(a ^ b)),
            (Set(a), Set(b)) => Ok(Set(a.symmetric_difference(b).cloned().collect())),
            _ => Err(type_fault(op, left, right)),
        },
        "|" => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a | b)),
            (Bool(a), Bool(b)) => Ok(Bool(a | b)),
            (Set(a), Set(b)) => Ok(Set(a.union(b).cloned().collect())),
            _ => Err(type_fault(op, left, right)),
        },
        "&" => match (left, right) {
            (Int(a), Int(b)) => Ok(Int(a & b)),
            (Bool(a), Bool(b)) => Ok(Bool(a & b)),
            (Set(a), Set(b)) => Ok(Set(a.intersection(b).cloned().collect())),
            _ => Err(type_fault(op, left, right)),
        },
        "and" => Ok(if left.truthy() {
            right.clone()
        } else {
            left.clone()
        }),
        "or" => Ok(if left.truthy() {
            left.clone()
        } else {
            right.clone()
        }),
        "<" => compare(op, left, right).map(|o| Bool(o == Ordering::Less)),
        ">" => compare(op, left, right).map(|o| Bool(o == Ordering::Greater)),
        "<=" => compare(op, left, right).map(|o| Bool(o != Ordering::Greater)),
        ">=" => compare(op, left, right).map(|o| Bool(o != Ordering::Less)),
        "==" => Ok(Bool(left.loose_eq(right))),
        "is" => Ok(Bool(left == right)),
        other => Err(Fault::Value(format!("invalid operator '{other}'"))),
    }
}

/// Apply a unary operator.
pub fn unary_op(op: &str, value: &Value) -> Result<Value, Fault> {
    match op {
        "-" => match value {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(Fault::Type(format!(
                "cannot negate a {}",
                other.type_name()
            ))),
        },
        "~" => match value {
            Value::Int(n) => Ok(Value::Int(!n)),
            other => Err(Fault::Type(format!(
                "cannot bitwise-invert a {}",
                other.type_name()
            ))),
        },
        "not" => Ok(Value::Bool(!value.truthy())),
        other => Err(Fault::Value(format!("invalid unary operator '{other}'"))),
    }
}

/// Ordering comparison for the relational operators; only same-shaped or
/// numeric pairs are comparable.
pub fn compare(op: &str, left: &Value, right: &Value) -> Result<Ordering, Fault> {
    use Value::*;
    match (left, right) {
        (Int(a), Float(b)) => Ok((*a as f64).total_cmp(b)),
        (Float(a), Int(b)) => Ok(a.total_cmp(&(*b as f64))),
        (Int(_), Int(_))
        | (Float(_), Float(_))
        | (Str(_), Str(_))
        | (Bool(_), Bool(_))
        | (List(_), List(_))
        | (Tuple(_), Tuple(_)) => Ok(left.cmp(right)),
        _ => Err(type_fault(op, left, right)),
    }
}

fn numeric(
    op: &str,
    left: &Value,
    right: &Value,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Value, Fault> {
    let (a, b) = as_floats(op, left, right)?;
    Ok(Value::Float(apply(a, b)))
}

fn as_floats(op: &str, left: &Value, right: &Value) -> Result<(f64, f64), Fault> {
    let a = match left {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => return Err(type_fault(op, left, right)),
    };
    let b = match right {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => return Err(type_fault(op, left, right)),
    };
    Ok((a, b))
}

fn type_fault(op: &str, left: &Value, right: &Value) -> Fault {
    Fault::Type(format!(
        "unsupported operand types for '{op}': {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a / b;
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

// Remainder taking the divisor's sign, pairing with floor_div
fn floor_mod(a: i64, b: i64) -> i64 {
    let remainder = a % b;
    if remainder != 0 && (remainder < 0) != (b < 0) {
        remainder + b
    } else {
        remainder
    }
}

// --- Serialization ---
//
// Plain JSON shapes carry None/bool/int/float/string/list directly;
// tuples, sets, and dicts wrap themselves in a `__decode_as__` object so
// they survive JSON's missing types.

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Tuple(items) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("__decode_as__", "tuple")?;
                map.serialize_entry("values", items)?;
                map.end()
            }
            Value::Set(items) => {
                let values: Vec<&Value> = items.iter().collect();
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("__decode_as__", "set")?;
                map.serialize_entry("values", &values)?;
                map.end()
            }
            Value::Dict(entries) => {
                let values: Vec<(&Value, &Value)> = entries.iter().collect();
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("__decode_as__", "dict")?;
                map.serialize_entry("values", &values)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        from_json(raw).map_err(D::Error::custom)
    }
}

fn from_json(raw: serde_json::Value) -> Result<Value, String> {
    match raw {
        serde_json::Value::Null => Ok(Value::None),
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(x) = n.as_f64() {
                Ok(Value::Float(x))
            } else {
                Err(format!("unrepresentable number {n}"))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Str(s)),
        serde_json::Value::Array(items) => {
            let converted: Result<Vec<Value>, String> = items.into_iter().map(from_json).collect();
            Ok(Value::List(converted?))
        }
        serde_json::Value::Object(mut fields) => {
            let tag = match fields.get("__decode_as__").and_then(|v| v.as_str()) {
                Some(tag) => tag.to_string(),
                None => {
                    // A plain object decodes as a string-keyed dict
                    let mut entries = BTreeMap::new();
                    for (key, value) in fields {
                        entries.insert(Value::Str(key), from_json(value)?);
                    }
                    return Ok(Value::Dict(entries));
                }
            };
            let values = fields
                .remove("values")
                .ok_or_else(|| format!("__decode_as__ '{tag}' object is missing 'values'"))?;
            match tag.as_str() {
                "tuple" => match from_json(values)? {
                    Value::List(items) => Ok(Value::Tuple(items)),
                    _ => Err("tuple 'values' must be an array".to_string()),
                },
                "set" => match from_json(values)? {
                    Value::List(items) => Ok(Value::Set(items.into_iter().collect())),
                    _ => Err("set 'values' must be an array".to_string()),
                },
                "dict" => match from_json(values)? {
                    Value::List(pairs) => {
                        let mut entries = BTreeMap::new();
                        for pair in pairs {
                            match pair {
                                Value::List(mut kv) if kv.len() == 2 => {
                                    let value = kv.pop().expect("length checked");
                                    let key = kv.pop().expect("length checked");
                                    entries.insert(key, value);
                                }
                                _ => return Err("dict 'values' must hold pairs".to_string()),
                            }
                        }
                        Ok(Value::Dict(entries))
                    }
                    _ => Err("dict 'values' must be an array".to_string()),
                },
                other => Err(format!("unknown __decode_as__ tag '{other}'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Int(3).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("x".into()).truthy());
        assert!(!Value::List(vec![]).truthy());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            binary_op("+", &Value::Int(2), &Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            binary_op("+", &Value::Int(2), &Value::Float(0.5)).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            binary_op("//", &Value::Int(-7), &Value::Int(2)).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(
            binary_op("%", &Value::Int(-7), &Value::Int(3)).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            binary_op("**", &Value::Int(2), &Value::Int(10)).unwrap(),
            Value::Int(1024)
        );
        assert!(binary_op("/", &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn string_and_list_ops() {
        assert_eq!(
            binary_op("+", &Value::Str("ab".into()), &Value::Str("cd".into())).unwrap(),
            Value::Str("abcd".into())
        );
        assert_eq!(
            binary_op("*", &Value::Str("ab".into()), &Value::Int(3)).unwrap(),
            Value::Str("ababab".into())
        );
        assert_eq!(
            binary_op(
                "+",
                &Value::List(vec![Value::Int(1)]),
                &Value::List(vec![Value::Int(2)])
            )
            .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn set_ops() {
        let a: Value = Value::Set([Value::Int(1), Value::Int(2)].into_iter().collect());
        let b: Value = Value::Set([Value::Int(2), Value::Int(3)].into_iter().collect());
        assert_eq!(
            binary_op("|", &a, &b).unwrap(),
            Value::Set([Value::Int(1), Value::Int(2), Value::Int(3)].into_iter().collect())
        );
        assert_eq!(
            binary_op("&", &a, &b).unwrap(),
            Value::Set([Value::Int(2)].into_iter().collect())
        );
        assert_eq!(
            binary_op("-", &a, &b).unwrap(),
            Value::Set([Value::Int(1)].into_iter().collect())
        );
    }

    #[test]
    fn short_circuit_values() {
        assert_eq!(
            binary_op("and", &Value::Int(0), &Value::Int(5)).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            binary_op("and", &Value::Int(1), &Value::Int(5)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            binary_op("or", &Value::Int(0), &Value::Int(5)).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            binary_op("<", &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary_op("==", &Value::Int(1), &Value::Float(1.0)).unwrap(),
            Value::Bool(true)
        );
        assert!(binary_op("<", &Value::Int(1), &Value::Str("a".into())).is_err());
    }

    #[test]
    fn unary() {
        assert_eq!(unary_op("-", &Value::Int(3)).unwrap(), Value::Int(-3));
        assert_eq!(unary_op("~", &Value::Int(0)).unwrap(), Value::Int(-1));
        assert_eq!(unary_op("not", &Value::Int(0)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn json_round_trip_tagged_shapes() {
        let value = Value::Dict(
            [(
                Value::Str("k".into()),
                Value::Tuple(vec![
                    Value::Int(1),
                    Value::Set([Value::Str("a".into())].into_iter().collect()),
                ]),
            )]
            .into_iter()
            .collect(),
        );
        let encoded = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn json_plain_shapes() {
        let decoded: Value = serde_json::from_str("[1, 2.5, \"x\", null, true]").unwrap();
        assert_eq!(
            decoded,
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Str("x".into()),
                Value::None,
                Value::Bool(true),
            ])
        );
    }
}

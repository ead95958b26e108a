//! In-memory evaluation with SQL three-valued logic. Used by `MemoryStore`.

use super::{FieldRef, Predicate};
use crate::config::{ColumnType, Operator};
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

impl Predicate {
    /// True only when the predicate is definitely true for `row` (NULL counts as false).
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.eval(row) == Some(true)
    }

    /// `None` is SQL UNKNOWN.
    pub fn eval(&self, row: &Map<String, Value>) -> Option<bool> {
        match self {
            Predicate::And(parts) => {
                let mut unknown = false;
                for p in parts {
                    match p.eval(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for p in parts {
                    match p.eval(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::Not(inner) => inner.eval(row).map(|b| !b),
            Predicate::IsNull { field, negated } => Some(field_value(field, row).is_none() != *negated),
            Predicate::In { field, values, negated } => {
                let lhs = field_value(field, row)?;
                let mut unknown = false;
                for v in values {
                    if v.is_null() {
                        unknown = true;
                    } else if compare(&lhs, v) == Some(Ordering::Equal) {
                        return Some(!negated);
                    }
                }
                if unknown {
                    None
                } else {
                    Some(*negated)
                }
            }
            Predicate::Compare { field, op, value } => {
                let lhs = field_value(field, row);
                match op {
                    Operator::Is => Some(distinct(lhs.as_ref(), value) == Some(false)),
                    Operator::IsNot => Some(distinct(lhs.as_ref(), value) == Some(true)),
                    _ => {
                        let lhs = lhs?;
                        if value.is_null() {
                            return None;
                        }
                        compare_op(&lhs, *op, value)
                    }
                }
            }
        }
    }
}

/// Resolve the referenced value; `None` is SQL NULL.
fn field_value(field: &FieldRef, row: &Map<String, Value>) -> Option<Value> {
    let mut v = row.get(&field.column)?;
    if field.path.is_empty() {
        return if v.is_null() { None } else { Some(v.clone()) };
    }
    for key in &field.path {
        v = match v {
            Value::Object(m) => m.get(key)?,
            Value::Array(a) => a.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    let text = match v {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match field.type_ {
        ColumnType::Integer => text.trim().parse::<i64>().ok().map(Value::from),
        _ => Some(Value::String(text)),
    }
}

/// IS DISTINCT FROM; NULLs compare equal to each other.
fn distinct(lhs: Option<&Value>, rhs: &Value) -> Option<bool> {
    match (lhs, rhs.is_null()) {
        (None, true) => Some(false),
        (None, false) | (Some(_), true) => Some(true),
        (Some(l), false) => Some(compare(l, rhs) != Some(Ordering::Equal)),
    }
}

pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) | (Value::String(y), Value::Number(x)) => {
            let y: f64 = y.trim().parse().ok()?;
            let ord = x.as_f64()?.partial_cmp(&y)?;
            // keep orientation when the string was on the left
            if matches!(a, Value::String(_)) {
                Some(ord.reverse())
            } else {
                Some(ord)
            }
        }
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare_op(lhs: &Value, op: Operator, rhs: &Value) -> Option<bool> {
    let ord = || compare(lhs, rhs);
    Some(match op {
        Operator::Eq => ord()? == Ordering::Equal,
        Operator::Ne => ord()? != Ordering::Equal,
        Operator::Lt => ord()? == Ordering::Less,
        Operator::Le => ord()? != Ordering::Greater,
        Operator::Gt => ord()? == Ordering::Greater,
        Operator::Ge => ord()? != Ordering::Less,
        Operator::Like => like(lhs.as_str()?, rhs.as_str()?, false)?,
        Operator::ILike => like(lhs.as_str()?, rhs.as_str()?, true)?,
        Operator::NotLike => !like(lhs.as_str()?, rhs.as_str()?, false)?,
        Operator::NotILike => !like(lhs.as_str()?, rhs.as_str()?, true)?,
        // the operand is spliced into a LIKE pattern, so `%` and `_` stay wildcards
        Operator::Contains => like(lhs.as_str()?, &format!("%{}%", rhs.as_str()?), false)?,
        Operator::StartsWith => like(lhs.as_str()?, &format!("{}%", rhs.as_str()?), false)?,
        Operator::EndsWith => like(lhs.as_str()?, &format!("%{}", rhs.as_str()?), false)?,
        Operator::In | Operator::NotIn | Operator::Is | Operator::IsNot => return None,
    })
}

/// SQL LIKE: `%` any run, `_` any single char.
fn like(s: &str, pattern: &str, case_insensitive: bool) -> Option<bool> {
    let mut re = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        re.push_str("(?i)");
    }
    re.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).ok().map(|r| r.is_match(s))
}

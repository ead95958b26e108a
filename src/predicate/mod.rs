//! Compiled predicates over a model's columns, and the compiler that builds them.

mod compile;
pub(crate) mod eval;

pub use compile::{compile, compile_filters, compile_tree, Compiled, TreePolicy};
pub(crate) use compile::coerce_cell;

use crate::config::{ColumnType, Operator};
use serde::Serialize;
use serde_json::Value;

/// A column reference, optionally narrowed to a nested document value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldRef {
    pub column: String,
    /// Path into a structured column; the narrowed value is compared as text.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    /// Effective type of the referenced value (after narrowing and casting).
    #[serde(rename = "type")]
    pub type_: ColumnType,
}

impl FieldRef {
    pub fn column(name: impl Into<String>, type_: ColumnType) -> Self {
        FieldRef {
            column: name.into(),
            path: Vec::new(),
            type_,
        }
    }

    pub fn is_narrowed(&self) -> bool {
        !self.path.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        field: FieldRef,
        op: Operator,
        value: Value,
    },
    In {
        field: FieldRef,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull {
        field: FieldRef,
        negated: bool,
    },
}

impl Predicate {
    /// AND of `parts`, flattening nested ANDs. `None` when there is nothing to constrain.
    pub fn all(parts: Vec<Predicate>) -> Option<Predicate> {
        let mut flat = Vec::with_capacity(parts.len());
        for p in parts {
            match p {
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Predicate::And(flat)),
        }
    }

    /// OR of `parts`. `None` when empty.
    pub fn any(mut parts: Vec<Predicate>) -> Option<Predicate> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::Or(parts)),
        }
    }

    pub fn negate(p: Predicate) -> Predicate {
        Predicate::Not(Box::new(p))
    }
}

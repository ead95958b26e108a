//! Resolved model registry: config validated and flattened for runtime use.

use crate::config::ColumnType;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Comparison operators a column may support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
    Like,
    ILike,
    NotLike,
    NotILike,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::In,
        Operator::NotIn,
        Operator::Is,
        Operator::IsNot,
        Operator::Like,
        Operator::ILike,
        Operator::NotLike,
        Operator::NotILike,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
    ];

    /// Short name used in config files and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::In => "in",
            Operator::NotIn => "notin",
            Operator::Is => "is",
            Operator::IsNot => "isnot",
            Operator::Like => "like",
            Operator::ILike => "ilike",
            Operator::NotLike => "notlike",
            Operator::NotILike => "notilike",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
        }
    }

    /// Capability name probed by the `op`, `op_`, `__op__` lookup.
    pub fn capability(&self) -> &'static str {
        match self {
            Operator::Eq => "__eq__",
            Operator::Ne => "__ne__",
            Operator::Lt => "__lt__",
            Operator::Le => "__le__",
            Operator::Gt => "__gt__",
            Operator::Ge => "__ge__",
            Operator::In => "in_",
            Operator::NotIn => "notin_",
            Operator::Is => "is_",
            Operator::IsNot => "isnot",
            Operator::Like => "like",
            Operator::ILike => "ilike",
            Operator::NotLike => "notlike",
            Operator::NotILike => "notilike",
            Operator::Contains => "contains",
            Operator::StartsWith => "startswith",
            Operator::EndsWith => "endswith",
        }
    }

    /// Accepts either the short name or the capability name.
    pub fn from_name(s: &str) -> Option<Operator> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s || op.capability() == s)
    }

    /// Membership operators take a list operand.
    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const ORDERED: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
    Operator::In,
    Operator::NotIn,
    Operator::Is,
    Operator::IsNot,
];

const PATTERN: &[Operator] = &[
    Operator::Like,
    Operator::ILike,
    Operator::NotLike,
    Operator::NotILike,
    Operator::Contains,
    Operator::StartsWith,
    Operator::EndsWith,
];

impl ColumnType {
    /// Operators supported by a column of this type unless overridden.
    pub fn default_operators(&self) -> Vec<Operator> {
        match self {
            ColumnType::Integer | ColumnType::Float | ColumnType::Timestamp | ColumnType::Uuid => {
                ORDERED.to_vec()
            }
            ColumnType::Text => ORDERED.iter().chain(PATTERN).copied().collect(),
            ColumnType::Boolean => vec![
                Operator::Eq,
                Operator::Ne,
                Operator::In,
                Operator::NotIn,
                Operator::Is,
                Operator::IsNot,
            ],
            ColumnType::Json => vec![Operator::Eq, Operator::Ne, Operator::Is, Operator::IsNot],
        }
    }
}

/// Find the first of `op`, `op_`, `__op__` that names one of `supported`.
pub fn probe_operator(supported: &[Operator], op: &str) -> Option<Operator> {
    let variants = [op.to_string(), format!("{}_", op), format!("__{}__", op)];
    variants
        .iter()
        .find_map(|v| supported.iter().copied().find(|s| s.capability() == v.as_str()))
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub type_: ColumnType,
    /// Capability table, fixed at registry build time.
    pub operators: Vec<Operator>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_: ColumnType) -> Self {
        ColumnInfo {
            name: name.into(),
            type_,
            operators: type_.default_operators(),
        }
    }

    pub fn resolve_operator(&self, op: &str) -> Option<Operator> {
        probe_operator(&self.operators, op)
    }

    pub fn is_structured(&self) -> bool {
        self.type_ == ColumnType::Json
    }
}

/// One registered entity type.
#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    pub name: String,
    /// False for the sentinel returned on lookup miss.
    pub known: bool,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnInfo>,
    pub restricted: HashSet<String>,
    pub read_level: Option<i64>,
    pub write_level: Option<i64>,
}

impl ModelDescriptor {
    /// Sentinel for names that are not registered: no columns, no levels.
    pub fn unknown(name: &str) -> Self {
        ModelDescriptor {
            name: name.to_string(),
            known: false,
            schema_name: None,
            table_name: String::new(),
            primary_key: None,
            columns: Vec::new(),
            restricted: HashSet::new(),
            read_level: None,
            write_level: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Read-only name → descriptor table, shared across requests.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    by_name: HashMap<String, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        let by_name = models
            .into_iter()
            .map(|m| (m.name.to_lowercase(), Arc::new(m)))
            .collect();
        ModelRegistry { by_name }
    }

    /// Case-insensitive lookup. Never fails: misses yield the deny-all sentinel.
    pub fn resolve(&self, name: &str) -> Arc<ModelDescriptor> {
        match self.by_name.get(&name.to_lowercase()) {
            Some(m) => Arc::clone(m),
            None => Arc::new(ModelDescriptor::unknown(name)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.values().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.by_name.values().map(|m| m.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_prefers_plain_then_suffix_then_dunder() {
        let text = ColumnType::Text.default_operators();
        assert_eq!(probe_operator(&text, "like"), Some(Operator::Like));
        assert_eq!(probe_operator(&text, "in"), Some(Operator::In));
        assert_eq!(probe_operator(&text, "gt"), Some(Operator::Gt));
        assert_eq!(probe_operator(&text, "__ge__"), Some(Operator::Ge));
        assert_eq!(probe_operator(&text, "bogus"), None);
    }

    #[test]
    fn capability_depends_on_column_type() {
        let id = ColumnInfo::new("id", ColumnType::Integer);
        assert_eq!(id.resolve_operator("lt"), Some(Operator::Lt));
        assert_eq!(id.resolve_operator("like"), None);
        let doc = ColumnInfo::new("data", ColumnType::Json);
        assert_eq!(doc.resolve_operator("gt"), None);
        assert_eq!(doc.resolve_operator("eq"), Some(Operator::Eq));
    }

    #[test]
    fn unknown_names_resolve_to_sentinel() {
        let reg = ModelRegistry::new(vec![ModelDescriptor {
            name: "dbuser".into(),
            known: true,
            schema_name: None,
            table_name: "users".into(),
            primary_key: Some("id".into()),
            columns: vec![ColumnInfo::new("id", ColumnType::Integer)],
            restricted: HashSet::new(),
            read_level: Some(1),
            write_level: Some(4),
        }]);
        assert!(reg.resolve("DbUser").known);
        assert!(reg.resolve("dbuser").known);
        for name in ["", "nope", "db user"] {
            let m = reg.resolve(name);
            assert!(!m.known);
            assert_eq!(m.read_level, None);
            assert_eq!(m.write_level, None);
            assert!(m.restricted.is_empty());
        }
    }
}

//! Typed query specification, built from explicit fields and raw request args.

mod parser;

pub use parser::{parse_flag, QuerySpecBuilder, DEFAULT_LIMIT};

use serde::Serialize;
use serde_json::{Map, Value};

/// One `(field, op, value)` filter. `value` is a string from a URI or any JSON value when built explicitly.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterTriple {
    pub field: String,
    pub op: String,
    pub value: Value,
}

impl FilterTriple {
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterTriple {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOp {
    /// Group key that also feeds the synthesized `count` column.
    Count,
    Group,
}

impl GroupOp {
    /// Any op mentioning `count` aggregates; everything else only groups.
    pub fn parse(s: &str) -> GroupOp {
        if s.contains("count") {
            GroupOp::Count
        } else {
            GroupOp::Group
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupField {
    pub field: String,
    pub op: GroupOp,
}

impl GroupField {
    pub fn new(field: impl Into<String>, op: GroupOp) -> Self {
        GroupField { field: field.into(), op }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// How many rows a read materializes. Exactly one applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cardinality {
    #[default]
    All,
    First,
    Count,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    #[default]
    Object,
    Datatable,
    Chart,
    /// Return the assembled query instead of rows.
    Query,
    /// Return the visible column names only.
    Schema,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrudOp {
    Insert,
    Update,
    Delete,
}

impl CrudOp {
    pub fn parse(s: &str) -> Option<CrudOp> {
        match s {
            "insert" => Some(CrudOp::Insert),
            "update" => Some(CrudOp::Update),
            "delete" => Some(CrudOp::Delete),
            _ => None,
        }
    }
}

/// A parsed request. Immutable once built; consumed by one pipeline run.
#[derive(Clone, Debug)]
pub struct QuerySpec {
    pub model: String,
    pub access_level: i64,
    pub filters: Vec<FilterTriple>,
    pub group_by: Vec<GroupField>,
    pub order_by: Option<OrderBy>,
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    /// `None` means no limit.
    pub limit: Option<u32>,
    pub cardinality: Cardinality,
    pub render: RenderMode,
    /// Raw verb; validated by the CRUD executor so bad verbs still produce a message.
    pub crud: Option<String>,
    pub payload: Map<String, Value>,
    /// Boolean filter document with a top-level `query` key.
    pub tree: Option<Value>,
}

impl QuerySpec {
    pub fn builder(model: impl Into<String>) -> QuerySpecBuilder {
        QuerySpecBuilder::new(model)
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }
}

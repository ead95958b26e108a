//! Filter triples and the boolean filter document → `Predicate`.

use super::{FieldRef, Predicate};
use crate::config::{probe_operator, ColumnType, ModelDescriptor, Operator};
use crate::error::QueryError;
use crate::spec::FilterTriple;
use serde::Deserialize;
use serde_json::Value;

/// What to do with a malformed clause in the filter document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TreePolicy {
    /// Drop the clause and record a diagnostic.
    #[default]
    Lenient,
    /// Fail the request with `InvalidFilter`.
    Strict,
}

/// Result of compiling a request's filters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Compiled {
    /// `None` when no constraint applies.
    pub predicate: Option<Predicate>,
    /// Clauses dropped from the filter document under the lenient policy.
    pub diagnostics: Vec<String>,
}

/// Compile triples (AND-combined) and layer the filter document on top.
pub fn compile(
    model: &ModelDescriptor,
    filters: &[FilterTriple],
    tree: Option<&Value>,
    policy: TreePolicy,
) -> Result<Compiled, QueryError> {
    let mut parts = Vec::new();
    if let Some(p) = compile_filters(model, filters)? {
        parts.push(p);
    }
    let mut diagnostics = Vec::new();
    if let Some(tree) = tree {
        let compiled = compile_tree(model, tree, policy)?;
        diagnostics = compiled.diagnostics;
        parts.extend(compiled.predicate);
    }
    Ok(Compiled {
        predicate: Predicate::all(parts),
        diagnostics,
    })
}

pub fn compile_filters(model: &ModelDescriptor, filters: &[FilterTriple]) -> Result<Option<Predicate>, QueryError> {
    let mut parts = Vec::with_capacity(filters.len());
    for f in filters {
        parts.push(compile_clause(model, &f.field, &[], &f.op, &f.value)?);
    }
    Ok(Predicate::all(parts))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bucket {
    Must,
    Or,
    Not,
}

impl Bucket {
    fn parse(key: &str) -> Option<Bucket> {
        match key {
            "must_" | "must" => Some(Bucket::Must),
            "or_" | "or" => Some(Bucket::Or),
            "not_" | "not" => Some(Bucket::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeClause {
    column: String,
    #[serde(default)]
    subkeys: Option<Vec<String>>,
    #[serde(default)]
    op: Option<String>,
    value: Value,
}

/// Compile a `{"query": {"must_": [...], "or_": [...], "not_": [...]}}` document.
///
/// Each `not_` entry becomes its own `NOT(x)` conjunct; the rest combine as
/// `OR(AND(must...), or1, or2, ...)`. An empty `must_` group adds no operand.
pub fn compile_tree(model: &ModelDescriptor, tree: &Value, policy: TreePolicy) -> Result<Compiled, QueryError> {
    let mut diagnostics = Vec::new();
    let mut report = |msg: String| -> Result<(), QueryError> {
        match policy {
            TreePolicy::Strict => Err(QueryError::InvalidFilter(msg)),
            TreePolicy::Lenient => {
                tracing::warn!(model = %model.name, reason = %msg, "dropping filter document clause");
                diagnostics.push(msg);
                Ok(())
            }
        }
    };

    let Some(groups) = tree.get("query").and_then(Value::as_object) else {
        report("Invalid filter document: missing 'query' object".to_string())?;
        return Ok(Compiled {
            predicate: None,
            diagnostics,
        });
    };

    let mut must = Vec::new();
    let mut any = Vec::new();
    let mut nots = Vec::new();

    for (key, entries) in groups {
        let Some(bucket) = Bucket::parse(key) else {
            report(format!("Invalid filter group: {}", key))?;
            continue;
        };
        let entries = match entries {
            Value::Null => continue,
            Value::Array(a) => a,
            _ => {
                report(format!("Invalid filter group: {} must be a list", key))?;
                continue;
            }
        };
        for entry in entries {
            let clause: TreeClause = match serde_json::from_value(entry.clone()) {
                Ok(c) => c,
                Err(e) => {
                    report(format!("Invalid filter. Column and Value are mandatory: {}", e))?;
                    continue;
                }
            };
            let subkeys = clause.subkeys.unwrap_or_default();
            let op = clause.op.as_deref().unwrap_or("eq");
            match compile_clause(model, &clause.column, &subkeys, op, &clause.value) {
                Ok(p) => match bucket {
                    Bucket::Must => must.push(p),
                    Bucket::Or => any.push(p),
                    Bucket::Not => nots.push(p),
                },
                Err(e) => report(e.to_string())?,
            }
        }
    }

    let mut conjuncts: Vec<Predicate> = nots.into_iter().map(Predicate::negate).collect();
    let mut alternatives = Vec::with_capacity(any.len() + 1);
    if let Some(m) = Predicate::all(must) {
        alternatives.push(m);
    }
    alternatives.extend(any);
    conjuncts.extend(Predicate::any(alternatives));

    Ok(Compiled {
        predicate: Predicate::all(conjuncts),
        diagnostics,
    })
}

/// One `(column[, subkeys], op, value)` clause.
fn compile_clause(
    model: &ModelDescriptor,
    column: &str,
    subkeys: &[String],
    op: &str,
    value: &Value,
) -> Result<Predicate, QueryError> {
    let col = model
        .column(column)
        .ok_or_else(|| QueryError::InvalidFilter(format!("Invalid filter column: {}", column)))?;

    let (field, op) = if subkeys.is_empty() {
        let op = col
            .resolve_operator(op)
            .ok_or_else(|| QueryError::InvalidFilter(format!("Invalid filter operator: {}", op)))?;
        (FieldRef::column(column, col.type_), op)
    } else {
        if !col.is_structured() {
            return Err(QueryError::InvalidFilter(format!(
                "Invalid filter: subkeys on non-structured column {}",
                column
            )));
        }
        // Narrowed values are text, cast to integer when compared with an integer.
        let type_ = if value.is_i64() || value.is_u64() {
            ColumnType::Integer
        } else {
            ColumnType::Text
        };
        let op = probe_operator(&type_.default_operators(), op)
            .ok_or_else(|| QueryError::InvalidFilter(format!("Invalid filter operator: {}", op)))?;
        let field = FieldRef {
            column: column.to_string(),
            path: subkeys.to_vec(),
            type_,
        };
        (field, op)
    };

    if op.is_membership() {
        let raw: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            Value::String(s) => s.split(',').map(|v| Value::String(v.to_string())).collect(),
            other => vec![other.clone()],
        };
        let values = raw
            .iter()
            .map(|v| coerce(&field, v))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Predicate::In {
            field,
            values,
            negated: op == Operator::NotIn,
        });
    }

    if is_null_literal(value) {
        return Ok(match op {
            Operator::Eq | Operator::Is => Predicate::IsNull { field, negated: false },
            Operator::Ne | Operator::IsNot => Predicate::IsNull { field, negated: true },
            _ => Predicate::Compare {
                field,
                op,
                value: Value::Null,
            },
        });
    }

    let value = coerce(&field, value)?;
    Ok(Predicate::Compare { field, op, value })
}

fn is_null_literal(v: &Value) -> bool {
    v.is_null() || v.as_str() == Some("null")
}

/// Coerce a value headed for storage the same way filter values are coerced, so stored
/// cells and filter operands share one canonical form.
pub(crate) fn coerce_cell(column: &str, type_: ColumnType, v: &Value) -> Result<Value, QueryError> {
    coerce(&FieldRef::column(column, type_), v)
}

/// Coerce a loosely typed value to the field's type.
fn coerce(field: &FieldRef, v: &Value) -> Result<Value, QueryError> {
    let bad = || QueryError::InvalidFilter(format!("Invalid filter value for {}: {}", field.column, v));
    if v.is_null() {
        return Ok(Value::Null);
    }
    Ok(match field.type_ {
        ColumnType::Integer => match v {
            Value::Number(n) => n.as_i64().map(Value::from).ok_or_else(bad)?,
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| bad())?,
            _ => return Err(bad()),
        },
        ColumnType::Float => match v {
            Value::Number(n) => n.as_f64().and_then(serde_json::Number::from_f64).map(Value::Number).ok_or_else(bad)?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(bad)?,
            _ => return Err(bad()),
        },
        ColumnType::Text => match v {
            Value::String(_) => v.clone(),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            _ => return Err(bad()),
        },
        ColumnType::Boolean => match v {
            Value::Bool(_) => v.clone(),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
            _ => return Err(bad()),
        },
        ColumnType::Timestamp => {
            let s = v.as_str().ok_or_else(bad)?;
            Value::String(normalize_timestamp(s).ok_or_else(bad)?)
        }
        ColumnType::Uuid => {
            let s = v.as_str().ok_or_else(bad)?;
            let u = uuid::Uuid::parse_str(s.trim()).map_err(|_| bad())?;
            Value::String(u.to_string())
        }
        ColumnType::Json => match v {
            Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| v.clone()),
            _ => v.clone(),
        },
    })
}

/// Canonical text form for timestamps: `%Y-%m-%dT%H:%M:%S%.f`, naive UTC.
pub(crate) fn normalize_timestamp(s: &str) -> Option<String> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    const FMT: &str = "%Y-%m-%dT%H:%M:%S%.f";
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().format(FMT).to_string());
    }
    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, pattern) {
            return Some(dt.format(FMT).to_string());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(FMT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn model(name: &str) -> Arc<ModelDescriptor> {
        ModelRegistry::builtin().expect("builtin").resolve(name)
    }

    fn field(name: &str, t: ColumnType) -> FieldRef {
        FieldRef::column(name, t)
    }

    #[test]
    fn triples_are_and_combined_with_coerced_values() {
        let m = model("dbblacklist");
        let filters = vec![
            FilterTriple::new("id", "eq", "1"),
            FilterTriple::new("datatype", "like", "pa%"),
        ];
        let p = compile_filters(&m, &filters).expect("compile").expect("predicate");
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::Compare {
                    field: field("id", ColumnType::Integer),
                    op: Operator::Eq,
                    value: json!(1),
                },
                Predicate::Compare {
                    field: field("datatype", ColumnType::Text),
                    op: Operator::Like,
                    value: json!("pa%"),
                },
            ])
        );
    }

    #[test]
    fn unknown_column_operator_and_value_fail() {
        let m = model("dbuser");
        let err = compile_filters(&m, &[FilterTriple::new("nope", "eq", "1")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid filter column: nope");
        let err = compile_filters(&m, &[FilterTriple::new("id", "like", "1")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid filter operator: like");
        let err = compile_filters(&m, &[FilterTriple::new("id", "gt", "abc")]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn null_literal_becomes_null_test() {
        let m = model("dbuser");
        let p = compile_filters(&m, &[FilterTriple::new("email", "eq", "null")]).unwrap();
        assert_eq!(
            p,
            Some(Predicate::IsNull {
                field: field("email", ColumnType::Text),
                negated: false
            })
        );
        let p = compile_filters(&m, &[FilterTriple::new("email", "ne", "null")]).unwrap();
        assert!(matches!(p, Some(Predicate::IsNull { negated: true, .. })));
    }

    #[test]
    fn in_accepts_list_or_comma_string() {
        let m = model("dbuser");
        let from_str = compile_filters(&m, &[FilterTriple::new("id", "in", "1,2,3")]).unwrap();
        let from_list = compile_filters(&m, &[FilterTriple::new("id", "in_", json!([1, 2, 3]))]).unwrap();
        assert_eq!(from_str, from_list);
        assert!(matches!(from_str, Some(Predicate::In { ref values, negated: false, .. }) if values.len() == 3));
    }

    #[test]
    fn timestamps_are_normalized() {
        assert_eq!(
            normalize_timestamp("2018-05-10 02:05:57.1913").as_deref(),
            Some("2018-05-10T02:05:57.191300")
        );
        assert_eq!(normalize_timestamp("2018-05-10").as_deref(), Some("2018-05-10T00:00:00"));
        assert_eq!(normalize_timestamp("yesterday"), None);
    }

    #[test]
    fn tree_combines_must_or_not() {
        let m = model("testtable");
        let tree = json!({"query": {
            "must_": [{"column": "message", "op": "eq", "value": "a"}],
            "or_": [{"column": "id", "subkeys": [], "op": "eq", "value": 5}],
            "not_": [{"column": "data", "subkeys": ["category"], "op": "eq", "value": "x"}]
        }});
        let c = compile_tree(&m, &tree, TreePolicy::Strict).expect("compile");
        assert!(c.diagnostics.is_empty());
        let narrowed = FieldRef {
            column: "data".into(),
            path: vec!["category".into()],
            type_: ColumnType::Text,
        };
        assert_eq!(
            c.predicate,
            Some(Predicate::And(vec![
                Predicate::negate(Predicate::Compare {
                    field: narrowed,
                    op: Operator::Eq,
                    value: json!("x"),
                }),
                Predicate::Or(vec![
                    Predicate::Compare {
                        field: field("message", ColumnType::Text),
                        op: Operator::Eq,
                        value: json!("a"),
                    },
                    Predicate::Compare {
                        field: field("id", ColumnType::Integer),
                        op: Operator::Eq,
                        value: json!(5),
                    },
                ]),
            ]))
        );
    }

    #[test]
    fn numeric_subkey_values_cast_to_integer() {
        let m = model("testtable");
        let tree = json!({"query": {"must_": [
            {"column": "data", "subkeys": ["stats", "cpu"], "op": "gt", "value": 50}
        ]}});
        let c = compile_tree(&m, &tree, TreePolicy::Strict).unwrap();
        match c.predicate {
            Some(Predicate::Compare { field, op, value }) => {
                assert_eq!(field.type_, ColumnType::Integer);
                assert_eq!(field.path, vec!["stats", "cpu"]);
                assert_eq!(op, Operator::Gt);
                assert_eq!(value, json!(50));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lenient_policy_drops_bad_clauses_and_keeps_good_ones() {
        let m = model("testtable");
        let tree = json!({"query": {
            "must_": [
                {"column": "message", "value": "ok"},
                {"column": "missing", "value": 1},
                {"value": 1}
            ],
            "maybe_": [{"column": "id", "value": 1}]
        }});
        let c = compile_tree(&m, &tree, TreePolicy::Lenient).expect("lenient never fails");
        assert_eq!(c.diagnostics.len(), 3);
        assert_eq!(
            c.predicate,
            Some(Predicate::Compare {
                field: field("message", ColumnType::Text),
                op: Operator::Eq,
                value: json!("ok"),
            })
        );

        let err = compile_tree(&m, &tree, TreePolicy::Strict).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilter(_)));
    }

    #[test]
    fn subkeys_require_structured_column() {
        let m = model("testtable");
        let tree = json!({"query": {"must_": [
            {"column": "message", "subkeys": ["a"], "value": "x"}
        ]}});
        assert!(compile_tree(&m, &tree, TreePolicy::Strict).is_err());
    }

    #[test]
    fn empty_must_with_or_entries_is_plain_or() {
        let m = model("testtable");
        let tree = json!({"query": {"must_": [], "or_": [
            {"column": "id", "value": 1},
            {"column": "id", "value": 2}
        ]}});
        let c = compile_tree(&m, &tree, TreePolicy::Strict).unwrap();
        assert!(matches!(c.predicate, Some(Predicate::Or(ref v)) if v.len() == 2));
    }

    #[test]
    fn missing_query_key_is_reported() {
        let m = model("testtable");
        let c = compile_tree(&m, &json!({"must_": []}), TreePolicy::Lenient).unwrap();
        assert_eq!(c.predicate, None);
        assert_eq!(c.diagnostics.len(), 1);
    }
}

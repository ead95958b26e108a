//! Renders assembled queries as parameterized PostgreSQL. Identifiers come from the
//! registry only; every value is a placeholder with an explicit cast.

use crate::config::{ColumnType, ModelDescriptor, Operator};
use crate::predicate::{FieldRef, Predicate};
use crate::query::{AssembledQuery, Projection};
use crate::sql::BindValue;
use crate::spec::Direction;
use serde::Serialize;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name, schema-qualified when the model names a schema.
fn qualified_table(model: &ModelDescriptor) -> String {
    match &model.schema_name {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&model.table_name)),
        None => quoted(&model.table_name),
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: BindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// `$n::type` for a value of the given column type.
    fn placeholder(&mut self, v: &Value, type_: ColumnType) -> String {
        let n = self.push_param(BindValue::for_column(v, type_));
        format!("${}::{}", n, type_.pg_type())
    }
}

fn field_expr(q: &mut QueryBuf, field: &FieldRef) -> String {
    if !field.is_narrowed() {
        return quoted(&field.column);
    }
    let path: Vec<String> = field
        .path
        .iter()
        .map(|k| format!("${}::text", q.push_param(BindValue::text(k.clone()))))
        .collect();
    let text = format!("({} #>> ARRAY[{}])", quoted(&field.column), path.join(", "));
    if field.type_ == ColumnType::Integer {
        format!("({})::bigint", text)
    } else {
        text
    }
}

fn render_predicate(q: &mut QueryBuf, p: &Predicate) -> String {
    match p {
        Predicate::And(parts) if parts.is_empty() => "TRUE".to_string(),
        Predicate::Or(parts) if parts.is_empty() => "FALSE".to_string(),
        Predicate::And(parts) => {
            let rendered: Vec<String> = parts.iter().map(|p| render_predicate(q, p)).collect();
            format!("({})", rendered.join(" AND "))
        }
        Predicate::Or(parts) => {
            let rendered: Vec<String> = parts.iter().map(|p| render_predicate(q, p)).collect();
            format!("({})", rendered.join(" OR "))
        }
        Predicate::Not(inner) => format!("(NOT {})", render_predicate(q, inner)),
        Predicate::IsNull { field, negated } => {
            let lhs = field_expr(q, field);
            if *negated {
                format!("{} IS NOT NULL", lhs)
            } else {
                format!("{} IS NULL", lhs)
            }
        }
        Predicate::In { field, values, negated } => {
            if values.is_empty() {
                return if *negated { "TRUE".into() } else { "FALSE".into() };
            }
            let lhs = field_expr(q, field);
            let list: Vec<String> = values.iter().map(|v| q.placeholder(v, field.type_)).collect();
            let kw = if *negated { "NOT IN" } else { "IN" };
            format!("{} {} ({})", lhs, kw, list.join(", "))
        }
        Predicate::Compare { field, op, value } => {
            let lhs = field_expr(q, field);
            let rhs = q.placeholder(value, field.type_);
            match op {
                Operator::Eq => format!("{} = {}", lhs, rhs),
                Operator::Ne => format!("{} != {}", lhs, rhs),
                Operator::Lt => format!("{} < {}", lhs, rhs),
                Operator::Le => format!("{} <= {}", lhs, rhs),
                Operator::Gt => format!("{} > {}", lhs, rhs),
                Operator::Ge => format!("{} >= {}", lhs, rhs),
                Operator::Is => format!("{} IS NOT DISTINCT FROM {}", lhs, rhs),
                Operator::IsNot => format!("{} IS DISTINCT FROM {}", lhs, rhs),
                Operator::Like => format!("{} LIKE {}", lhs, rhs),
                Operator::ILike => format!("{} ILIKE {}", lhs, rhs),
                Operator::NotLike => format!("{} NOT LIKE {}", lhs, rhs),
                Operator::NotILike => format!("{} NOT ILIKE {}", lhs, rhs),
                Operator::Contains => format!("{} LIKE '%' || {} || '%'", lhs, rhs),
                Operator::StartsWith => format!("{} LIKE {} || '%'", lhs, rhs),
                Operator::EndsWith => format!("{} LIKE '%' || {}", lhs, rhs),
                // membership never reaches Compare
                Operator::In | Operator::NotIn => format!("{} = {}", lhs, rhs),
            }
        }
    }
}

fn where_clause(q: &mut QueryBuf, predicate: Option<&Predicate>) -> String {
    match predicate {
        Some(p) => format!(" WHERE {}", render_predicate(q, p)),
        None => String::new(),
    }
}

/// SELECT without LIMIT; shared by `select` and `count`.
fn select_body(q: &mut QueryBuf, query: &AssembledQuery) -> String {
    let table = qualified_table(&query.model);
    match &query.projection {
        Projection::Rows => {
            let cols: Vec<String> = query.model.column_names().map(quoted).collect();
            let where_sql = where_clause(q, query.predicate.as_ref());
            let order_sql = query
                .order_by
                .as_ref()
                .map(|o| {
                    let dir = match o.direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    format!(" ORDER BY {} {}", quoted(&o.field), dir)
                })
                .unwrap_or_default();
            format!("SELECT {} FROM {}{}{}", cols.join(", "), table, where_sql, order_sql)
        }
        Projection::Grouped { keys, count, .. } => {
            let mut cols = Vec::with_capacity(keys.len() + 1);
            if let Some(c) = count {
                cols.push(format!("COUNT({}) AS {}", quoted(c), quoted("count")));
            }
            cols.extend(keys.iter().map(|k| quoted(k)));
            let where_sql = where_clause(q, query.predicate.as_ref());
            let group: Vec<String> = keys.iter().map(|k| quoted(k)).collect();
            format!(
                "SELECT {} FROM {}{} GROUP BY {}",
                cols.join(", "),
                table,
                where_sql,
                group.join(", ")
            )
        }
    }
}

pub fn select(query: &AssembledQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let body = select_body(&mut q, query);
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    q.sql = format!("{}{}", body, limit);
    q
}

/// Number of rows (or groups) the query yields, ignoring LIMIT.
pub fn count(query: &AssembledQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let body = select_body(&mut q, query);
    q.sql = format!("SELECT COUNT(*) FROM ({}) AS sub", body);
    q
}

/// INSERT of the payload columns (in model order). Returns the primary key when the model has one.
pub fn insert(model: &ModelDescriptor, payload: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(model);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        if let Some(v) = payload.get(&c.name) {
            cols.push(quoted(&c.name));
            placeholders.push(q.placeholder(v, c.type_));
        }
    }
    let returning = model
        .primary_key
        .as_ref()
        .map(|pk| format!(" RETURNING {}", quoted(pk)))
        .unwrap_or_default();
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES{}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE every row matched by the query's predicate.
pub fn update(query: &AssembledQuery, payload: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&query.model);
    let mut sets = Vec::new();
    for c in &query.model.columns {
        if let Some(v) = payload.get(&c.name) {
            let rhs = q.placeholder(v, c.type_);
            sets.push(format!("{} = {}", quoted(&c.name), rhs));
        }
    }
    let where_sql = where_clause(&mut q, query.predicate.as_ref());
    q.sql = format!("UPDATE {} SET {}{}", table, sets.join(", "), where_sql);
    q
}

/// DELETE every row matched by the query's predicate.
pub fn delete(query: &AssembledQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&query.model);
    let where_sql = where_clause(&mut q, query.predicate.as_ref());
    q.sql = format!("DELETE FROM {}{}", table, where_sql);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRegistry;
    use crate::predicate::{compile, TreePolicy};
    use crate::query::assemble;
    use crate::spec::{FilterTriple, GroupField, GroupOp, OrderBy};
    use serde_json::json;

    fn query(model: &str, filters: &[FilterTriple], tree: Option<Value>, group: &[GroupField]) -> AssembledQuery {
        let m = ModelRegistry::builtin().unwrap().resolve(model);
        let c = compile(&m, filters, tree.as_ref(), TreePolicy::Strict).unwrap();
        assemble(m, c.predicate, group, None).unwrap()
    }

    #[test]
    fn select_with_filters_order_and_limit() {
        let m = ModelRegistry::builtin().unwrap().resolve("dbuser");
        let c = compile(
            &m,
            &[FilterTriple::new("id", "ge", "2"), FilterTriple::new("username", "like", "a%")],
            None,
            TreePolicy::Strict,
        )
        .unwrap();
        let order = OrderBy {
            field: "id".into(),
            direction: Direction::Desc,
        };
        let q = assemble(m, c.predicate, &[], Some(&order)).unwrap().with_limit(Some(5));
        let buf = select(&q);
        assert_eq!(
            buf.sql,
            "SELECT \"id\", \"username\", \"email\", \"password_hash\", \"access_id\", \"date_added\" \
             FROM \"users\" WHERE (\"id\" >= $1::bigint AND \"username\" LIKE $2::text) \
             ORDER BY \"id\" DESC LIMIT 5"
        );
        assert_eq!(buf.params, vec![BindValue::I64(2), BindValue::text("a%")]);
    }

    #[test]
    fn grouped_select_and_count() {
        let q = query(
            "dbblacklist",
            &[],
            None,
            &[GroupField::new("datatype", GroupOp::Count)],
        );
        assert_eq!(
            select(&q).sql,
            "SELECT COUNT(\"datatype\") AS \"count\", \"datatype\" FROM \"blacklist\" GROUP BY \"datatype\""
        );
        assert_eq!(
            count(&q).sql,
            "SELECT COUNT(*) FROM (SELECT COUNT(\"datatype\") AS \"count\", \"datatype\" FROM \"blacklist\" GROUP BY \"datatype\") AS sub"
        );
    }

    #[test]
    fn narrowed_json_path_with_integer_cast() {
        let tree = json!({"query": {"must_": [
            {"column": "data", "subkeys": ["stats", "cpu"], "op": "gt", "value": 50}
        ]}});
        let q = query("testtable", &[], Some(tree), &[]);
        let buf = select(&q);
        assert!(buf
            .sql
            .contains("((\"data\" #>> ARRAY[$1::text, $2::text]))::bigint > $3::bigint"));
        assert_eq!(
            buf.params,
            vec![BindValue::text("stats"), BindValue::text("cpu"), BindValue::I64(50)]
        );
    }

    #[test]
    fn update_and_delete_use_predicate_only() {
        let q = query("dbuser", &[FilterTriple::new("id", "eq", "1")], None, &[]).with_limit(Some(10));
        let mut payload = Map::new();
        payload.insert("email".into(), json!("a@b.c"));
        let up = update(&q, &payload);
        assert_eq!(up.sql, "UPDATE \"users\" SET \"email\" = $1::text WHERE \"id\" = $2::bigint");
        let del = delete(&q);
        assert_eq!(del.sql, "DELETE FROM \"users\" WHERE \"id\" = $1::bigint");
    }

    #[test]
    fn insert_returns_primary_key() {
        let m = ModelRegistry::builtin().unwrap().resolve("testtable");
        let mut payload = Map::new();
        payload.insert("message".into(), json!("hi"));
        payload.insert("data".into(), json!({"a": 1}));
        let buf = insert(&m, &payload);
        assert_eq!(
            buf.sql,
            "INSERT INTO \"testtable\" (\"data\", \"message\") VALUES ($1::jsonb, $2::text) RETURNING \"id\""
        );
        assert_eq!(buf.params[0], BindValue::Json(json!({"a": 1})));
    }
}
